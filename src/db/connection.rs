use std::fs;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, Row};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::models::{Collection, Column, Record};

/// Handle to the on-disk record store. It holds only configuration: every
/// operation opens its own connection and drops it before returning, so the
/// database file is never held open between operator actions.
#[derive(Debug, Clone)]
pub struct RecordStore {
    config: StoreConfig,
}

impl RecordStore {
    /// Validate the config, create the data directory, and make sure both
    /// collection tables exist.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let store = Self { config };
        let conn = store.connect()?;
        for collection in Collection::ALL {
            create_table(&conn, store.table(collection))?;
        }
        tracing::debug!(path = %store.config.path.display(), "record store ready");
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn connect(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.config.path)?)
    }

    pub(crate) fn table(&self, collection: Collection) -> &str {
        self.config.table(collection)
    }
}

/// Schema shared by both collections. `cage_number` is TEXT because snapshots
/// disagree on whether it is numeric.
pub(crate) fn create_table(conn: &Connection, table: &str) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                internal_sequence INTEGER PRIMARY KEY AUTOINCREMENT,
                identifier TEXT NOT NULL,
                cage_number TEXT,
                mouseline TEXT,
                genotype TEXT,
                gender TEXT,
                dob TEXT,
                available TEXT,
                health TEXT,
                username TEXT,
                user_manipulations TEXT,
                status TEXT,
                comments TEXT
            )"
        ),
        [],
    )?;
    Ok(())
}

/// Comma-separated visible column list in exchange order.
pub(crate) fn column_list() -> String {
    Column::ALL
        .iter()
        .map(|column| column.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Hydrate a `Record` from a row selected with `column_list()` starting at
/// `offset`. Values are read leniently: `NULL` becomes an empty string and
/// numbers are rendered as text.
pub(crate) fn record_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Record> {
    let mut record = Record::default();
    for (idx, column) in Column::ALL.into_iter().enumerate() {
        record.set(column, text_value(row.get_ref(offset + idx)?));
    }
    Ok(record)
}

fn text_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(number) => number.to_string(),
        ValueRef::Real(number) => {
            if number.fract() == 0.0 && number.abs() < 1e15 {
                format!("{}", number as i64)
            } else {
                number.to_string()
            }
        }
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => String::from_utf8_lossy(bytes).into_owned(),
    }
}
