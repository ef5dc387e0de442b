use rusqlite::{OptionalExtension, TransactionBehavior};

use crate::error::StoreError;
use crate::models::{Collection, Outcome};

use super::connection::{column_list, record_from_row, RecordStore};
use super::records::{insert_row, resolve_sequence};

impl RecordStore {
    /// Copy the live record matching `identifier` into the deceased
    /// collection. The live row stays where it is; removing it is a separate
    /// delete. Fails without changes if the deceased collection already holds
    /// that identifier.
    pub fn migrate(&self, identifier: &str) -> Result<Outcome, StoreError> {
        let live = self.table(Collection::Live);
        let deceased = self.table(Collection::Deceased);

        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let record = tx
            .query_row(
                &format!(
                    "SELECT {} FROM {live}
                     WHERE identifier = ?1
                     ORDER BY internal_sequence
                     LIMIT 1",
                    column_list()
                ),
                [identifier],
                |row| record_from_row(row, 0),
            )
            .optional()?;

        let Some(record) = record else {
            tracing::warn!(identifier, "migration skipped: no live record");
            return Ok(Outcome::NotFound);
        };

        if resolve_sequence(&tx, deceased, identifier)?.is_some() {
            return Err(StoreError::DuplicateIdentifier(
                identifier.to_string(),
                Collection::Deceased.as_str(),
            ));
        }

        let sequence = insert_row(&tx, deceased, &record)?;
        tx.commit()?;

        tracing::info!(identifier, sequence, "copied record to deceased collection");
        Ok(Outcome::Applied)
    }
}
