//! Tracing subscriber setup. The terminal UI owns stdout, so logs always go to
//! a daily rolling file; non-interactive commands also mirror them to stderr.

use std::fs;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Environment variable overriding the filter (e.g. `mouse_records_manager=debug`).
pub const LOG_ENV: &str = "MOUSE_RECORDS_LOG";
const LOG_FILE_PREFIX: &str = "mouse-records.log";

/// Install the global subscriber. The returned guard flushes the file writer
/// on drop and must be held until the process exits.
pub fn init_logging(config: &LoggingConfig, console: bool) -> Result<WorkerGuard> {
    fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "failed to create log directory {}",
            config.directory.display()
        )
    })?;

    let env_filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        EnvFilter::new(format!("mouse_records_manager={}", config.level))
    });

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(false)
        .boxed();

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::debug!(directory = %config.directory.display(), "logging initialized");
    Ok(guard)
}
