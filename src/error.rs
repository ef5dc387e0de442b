//! Typed failures for the library layers. Application glue wraps these in
//! `anyhow::Error` with context, the same way it wraps SQLite errors.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by the record store and the CSV exchange.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {0} already exists in the {1} collection.")]
    DuplicateIdentifier(String, &'static str),
    #[error("Record identifier is required.")]
    MissingIdentifier,
    #[error("Unknown column `{0}`.")]
    UnknownColumn(String),
    #[error("Unknown collection `{0}` (expected `live` or `deceased`).")]
    UnknownCollection(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures while reading or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate home directory")]
    NoHomeDirectory,
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("table name `{0}` must be a plain identifier (letters, digits, underscores)")]
    InvalidTableName(String),
    #[error("live and deceased collections must use different tables (both are `{0}`)")]
    SharedTableName(String),
}

/// Failures of the session bootstrap and publish steps.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no publish remote configured (set `sync.remote_url`)")]
    NoRemote,
    #[error("failed to download {url}")]
    Download {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
    #[error("failed to read snapshot body from {url}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch `git {command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to prepare publish checkout {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("`git {command}` failed: {stderr}")]
    Git { command: String, stderr: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Render an error and its sources as `outer: inner: root`.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
