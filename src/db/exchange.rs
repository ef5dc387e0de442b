//! CSV exchange: the format snapshots are downloaded in, published in, and
//! exported in from the UI.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use rusqlite::TransactionBehavior;

use crate::error::StoreError;
use crate::models::{Collection, Column, Record};

use super::connection::RecordStore;
use super::records::insert_row;

impl RecordStore {
    /// Serialize the whole collection to CSV bytes with a header row.
    pub fn export(&self, collection: Collection) -> Result<Vec<u8>, StoreError> {
        let records = self.fetch(collection)?;
        let mut buffer = Vec::new();
        write_csv(&records, &mut buffer)?;
        Ok(buffer)
    }

    /// Write the export to `path`, creating parent directories as needed.
    /// Returns the number of records written.
    pub fn export_to_path(&self, collection: Collection, path: &Path) -> Result<usize, StoreError> {
        let records = self.fetch(collection)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let file = File::create(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        write_csv(&records, file)?;
        tracing::info!(%collection, path = %path.display(), records = records.len(), "exported collection");
        Ok(records.len())
    }

    /// Replace the contents of `collection` with the rows of a CSV snapshot.
    /// The delete and the inserts commit together, so a malformed snapshot
    /// leaves the previous contents in place. Returns the number of rows loaded.
    pub fn import<R: Read>(&self, collection: Collection, reader: R) -> Result<usize, StoreError> {
        let records = read_csv(reader)?;

        let table = self.table(collection);
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(&format!("DELETE FROM {table}"), [])?;

        let mut seen = HashSet::new();
        for record in &records {
            if !seen.insert(record.identifier.as_str()) {
                tracing::warn!(%collection, identifier = %record.identifier, "snapshot contains a duplicate identifier");
            }
            insert_row(&tx, table, record)?;
        }
        tx.commit()?;

        tracing::info!(%collection, records = records.len(), "replaced collection from snapshot");
        Ok(records.len())
    }

    pub fn import_from_path(&self, collection: Collection, path: &Path) -> Result<usize, StoreError> {
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.import(collection, file)
    }
}

/// Write `records` as CSV. The header is always emitted, even for an empty
/// collection, so an exported file can be re-imported unchanged.
pub fn write_csv<W: Write>(records: &[Record], writer: W) -> Result<(), StoreError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    writer.write_record(Column::ALL.iter().map(|column| column.as_str()))?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Parse CSV rows into records. Columns are matched by header name: the
/// legacy `id` header maps to `identifier`, unknown headers such as
/// `INDEX_ID` are ignored, and missing columns stay empty.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Record>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let records = reader
        .deserialize::<Record>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}
