//! Runtime configuration: database file, table names, snapshot URLs and the
//! publish target. Everything is handed to the store and session code at
//! construction time, so tests can build as many isolated instances as they
//! like.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::Collection;

/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".mouse-records";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "mouse_database.sqlite";
/// Config file name stored inside the application data directory.
const CONFIG_FILE_NAME: &str = "config.toml";
/// Overrides the database location without editing the config file.
pub const DB_PATH_ENV: &str = "MOUSE_RECORDS_DB";

const DEFAULT_LIVE_URL: &str =
    "https://raw.githubusercontent.com/mouse577/renderSQLmouseDB/main/initial_mouse_list.csv";
const DEFAULT_DECEASED_URL: &str =
    "https://raw.githubusercontent.com/mouse577/renderSQLmouseDB/main/initial_deceased_list.csv";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

/// Where the record store lives and which tables hold each collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub live_table: String,
    pub deceased_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: data_dir()
                .map(|dir| dir.join(DB_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from(DB_FILE_NAME)),
            live_table: "mouse_list".to_string(),
            deceased_table: "deceased_mouse_list".to_string(),
        }
    }
}

impl StoreConfig {
    /// Store config rooted at an explicit database file with default tables.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn table(&self, collection: Collection) -> &str {
        match collection {
            Collection::Live => &self.live_table,
            Collection::Deceased => &self.deceased_table,
        }
    }

    /// Table names are interpolated into SQL, so they must be plain
    /// identifiers and the two collections must not share a table.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for table in [&self.live_table, &self.deceased_table] {
            let mut chars = table.chars();
            let valid_start = chars
                .next()
                .map(|ch| ch.is_ascii_alphabetic() || ch == '_')
                .unwrap_or(false);
            if !valid_start || !chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
                return Err(ConfigError::InvalidTableName(table.clone()));
            }
        }
        if self.live_table.eq_ignore_ascii_case(&self.deceased_table) {
            return Err(ConfigError::SharedTableName(self.live_table.clone()));
        }
        Ok(())
    }
}

/// Snapshot download and git publish settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub live_url: String,
    pub deceased_url: String,
    /// Seconds before a snapshot download is abandoned.
    pub timeout_secs: u64,
    /// Local git checkout the CSV files are written to before publishing.
    pub repo_dir: PathBuf,
    pub live_file: String,
    pub deceased_file: String,
    /// Push target. Publishing is refused while this is empty; the
    /// checkout in `repo_dir` is initialized from it on first publish.
    pub remote_url: String,
    pub commit_message: String,
    pub author_name: String,
    pub author_email: String,
    /// Names of the environment variables holding the push credentials.
    pub username_env: String,
    pub token_env: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            live_url: DEFAULT_LIVE_URL.to_string(),
            deceased_url: DEFAULT_DECEASED_URL.to_string(),
            timeout_secs: 30,
            repo_dir: data_dir()
                .map(|dir| dir.join("sync"))
                .unwrap_or_else(|| PathBuf::from("sync")),
            live_file: "mouse_list.csv".to_string(),
            deceased_file: "deceased_mouse_list.csv".to_string(),
            remote_url: String::new(),
            commit_message: "Automated backup of mouse database tables".to_string(),
            author_name: "Mouse Records Automation".to_string(),
            author_email: "automation@example.com".to_string(),
            username_env: "GITHUB_USERNAME".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn url(&self, collection: Collection) -> &str {
        match collection {
            Collection::Live => &self.live_url,
            Collection::Deceased => &self.deceased_url,
        }
    }

    pub fn file_name(&self, collection: Collection) -> &str {
        match collection {
            Collection::Live => &self.live_file,
            Collection::Deceased => &self.deceased_file,
        }
    }

    /// Path of the CSV for `collection` inside the publish checkout.
    pub fn file_path(&self, collection: Collection) -> PathBuf {
        self.repo_dir.join(self.file_name(collection))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `MOUSE_RECORDS_LOG` is unset.
    pub level: String,
    pub directory: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: data_dir()
                .map(|dir| dir.join("logs"))
                .unwrap_or_else(|| PathBuf::from("logs")),
        }
    }
}

impl Config {
    /// Load the config from `path`, or from the default location when `None`.
    /// A missing file yields defaults; a present but malformed one is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };

        let mut config = if path.exists() {
            Self::load_from_file(&path)?
        } else {
            Self::default()
        };

        if let Ok(db_path) = env::var(DB_PATH_ENV) {
            if !db_path.trim().is_empty() {
                config.store.path = PathBuf::from(db_path);
            }
        }

        config.store.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// `~/.mouse-records/config.toml`.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    data_dir()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .ok_or(ConfigError::NoHomeDirectory)
}

fn data_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|base_dirs| base_dirs.home_dir().join(DATA_DIR_NAME))
}
