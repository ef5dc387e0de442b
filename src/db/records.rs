use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};

use crate::error::StoreError;
use crate::models::{Collection, Column, Outcome, Record};

use super::connection::{column_list, record_from_row, RecordStore};

impl RecordStore {
    /// Every record in `collection`, in storage order.
    pub fn fetch(&self, collection: Collection) -> Result<Vec<Record>, StoreError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM {} ORDER BY internal_sequence",
            column_list(),
            self.table(collection)
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([], |row| record_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Records whose `column` equals `value` exactly. The column comes from the
    /// closed `Column` set, so only the value needs to be bound.
    pub fn filter(
        &self,
        collection: Collection,
        column: Column,
        value: &str,
    ) -> Result<Vec<Record>, StoreError> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 ORDER BY internal_sequence",
            column_list(),
            self.table(collection),
            column.as_str()
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map([value], |row| record_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(%collection, %column, value, matches = records.len(), "filtered records");
        Ok(records)
    }

    pub fn count(&self, collection: Collection) -> Result<usize, StoreError> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", self.table(collection)),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Append a new record. The identifier must be present and unused within
    /// the collection; the check and the insert share one transaction.
    pub fn insert(&self, collection: Collection, record: &Record) -> Result<(), StoreError> {
        if record.identifier.trim().is_empty() {
            return Err(StoreError::MissingIdentifier);
        }

        let table = self.table(collection);
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if resolve_sequence(&tx, table, &record.identifier)?.is_some() {
            return Err(StoreError::DuplicateIdentifier(
                record.identifier.clone(),
                collection.as_str(),
            ));
        }
        let sequence = insert_row(&tx, table, record)?;
        tx.commit()?;

        tracing::info!(%collection, identifier = %record.identifier, sequence, "inserted record");
        Ok(())
    }

    /// Overwrite every attribute except the identifier on the record matching
    /// `identifier`. When legacy data holds duplicates, the first one in
    /// storage order is updated.
    pub fn update(
        &self,
        identifier: &str,
        collection: Collection,
        record: &Record,
    ) -> Result<Outcome, StoreError> {
        let table = self.table(collection);
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(sequence) = resolve_sequence(&tx, table, identifier)? else {
            tracing::warn!(%collection, identifier, "update skipped: record not found");
            return Ok(Outcome::NotFound);
        };

        let assignments = Column::ALL
            .iter()
            .skip(1)
            .enumerate()
            .map(|(idx, column)| format!("{} = ?{}", column.as_str(), idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let values = record.values();
        let mut bound: Vec<&dyn rusqlite::ToSql> = values[1..]
            .iter()
            .map(|value| value as &dyn rusqlite::ToSql)
            .collect();
        bound.push(&sequence);

        tx.execute(
            &format!(
                "UPDATE {table} SET {assignments} WHERE internal_sequence = ?{}",
                values.len()
            ),
            bound.as_slice(),
        )?;
        tx.commit()?;

        tracing::info!(%collection, identifier, sequence, "updated record");
        Ok(Outcome::Applied)
    }

    /// Remove the record matching `identifier` (the first in storage order if
    /// legacy duplicates exist).
    pub fn delete(&self, identifier: &str, collection: Collection) -> Result<Outcome, StoreError> {
        let table = self.table(collection);
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(sequence) = resolve_sequence(&tx, table, identifier)? else {
            tracing::warn!(%collection, identifier, "delete skipped: record not found");
            return Ok(Outcome::NotFound);
        };

        tx.execute(
            &format!("DELETE FROM {table} WHERE internal_sequence = ?1"),
            params![sequence],
        )?;
        tx.commit()?;

        tracing::info!(%collection, identifier, sequence, "deleted record");
        Ok(Outcome::Applied)
    }
}

/// Map a business key to the surrogate key of its first row.
pub(crate) fn resolve_sequence(
    conn: &Connection,
    table: &str,
    identifier: &str,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        &format!(
            "SELECT internal_sequence FROM {table}
             WHERE identifier = ?1
             ORDER BY internal_sequence
             LIMIT 1"
        ),
        [identifier],
        |row| row.get(0),
    )
    .optional()
}

/// Insert all visible attributes and return the freshly assigned surrogate key.
pub(crate) fn insert_row(conn: &Connection, table: &str, record: &Record) -> rusqlite::Result<i64> {
    let placeholders = (1..=Column::ALL.len())
        .map(|idx| format!("?{idx}"))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(
        &format!(
            "INSERT INTO {table} ({}) VALUES ({placeholders})",
            column_list()
        ),
        params_from_iter(record.values()),
    )?;
    Ok(conn.last_insert_rowid())
}
