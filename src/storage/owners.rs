use std::collections::HashSet;

use redb::ReadableTable;

use super::db::{Database, DatabaseError};
use super::models::{Fields, OwnerKind, OwnerRecord, Patch};
use super::tables::owner_table;

impl Database {
    // ========================================================================
    // Owner operations
    // ========================================================================

    /// Insert a new owning record. Returns false, writing nothing, if the id is taken.
    pub fn insert_owner(&self, record: &OwnerRecord) -> Result<bool, DatabaseError> {
        debug_assert!(!record.id.is_empty(), "owner id must not be empty");

        let write_txn = self.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(owner_table(record.kind))?;
            let taken = table.get(record.id.as_str())?.is_some();
            if !taken {
                let data = rmp_serde::to_vec_named(record)?;
                table.insert(record.id.as_str(), data.as_slice())?;
            }
            !taken
        };

        if inserted {
            write_txn.commit()?;
        } else {
            write_txn.abort()?;
        }
        Ok(inserted)
    }

    /// Get an owning record by kind and id
    pub fn get_owner(
        &self,
        kind: OwnerKind,
        id: &str,
    ) -> Result<Option<OwnerRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(owner_table(kind))?;

        match table.get(id)? {
            Some(data) => {
                let record: OwnerRecord = rmp_serde::from_slice(data.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Update an owning record's fields and binding in one write transaction.
    ///
    /// Returns `None` if no such owner exists, otherwise the attachment the
    /// record referenced immediately before this write.
    pub fn update_owner(
        &self,
        kind: OwnerKind,
        id: &str,
        fields: Option<&Fields>,
        attachment: Patch<&str>,
    ) -> Result<Option<Option<String>>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let existing = {
            let table = write_txn.open_table(owner_table(kind))?;
            let result = match table.get(id)? {
                Some(data) => {
                    let record: OwnerRecord = rmp_serde::from_slice(data.value())?;
                    Some(record)
                }
                None => None,
            };
            result
        };

        let Some(mut record) = existing else {
            write_txn.abort()?;
            return Ok(None);
        };

        let previous = record.attachment.clone();
        if let Some(fields) = fields {
            record.fields = fields.clone();
        }
        match attachment {
            Patch::Absent => {}
            Patch::Null => record.attachment = None,
            Patch::Value(name) => record.attachment = Some(name.to_string()),
        }
        record.updated_at = chrono::Utc::now();

        {
            let serialized = rmp_serde::to_vec_named(&record)?;
            let mut table = write_txn.open_table(owner_table(kind))?;
            table.insert(id, serialized.as_slice())?;
        }

        write_txn.commit()?;
        Ok(Some(previous))
    }

    /// Delete an owning record, returning it if it existed
    pub fn delete_owner(
        &self,
        kind: OwnerKind,
        id: &str,
    ) -> Result<Option<OwnerRecord>, DatabaseError> {
        let write_txn = self.begin_write()?;

        let removed = {
            let mut table = write_txn.open_table(owner_table(kind))?;
            let result = match table.remove(id)? {
                Some(data) => {
                    let record: OwnerRecord = rmp_serde::from_slice(data.value())?;
                    Some(record)
                }
                None => None,
            };
            result
        };

        write_txn.commit()?;
        Ok(removed)
    }

    /// All records of one kind
    pub fn list_owners(&self, kind: OwnerKind) -> Result<Vec<OwnerRecord>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(owner_table(kind))?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_, value) = result?;
            let record: OwnerRecord = rmp_serde::from_slice(value.value())?;
            records.push(record);
        }

        Ok(records)
    }

    /// Point-in-time set of attachment names bound by records of one kind
    pub fn referenced_attachments(&self, kind: OwnerKind) -> Result<HashSet<String>, DatabaseError> {
        Ok(self
            .list_owners(kind)?
            .iter()
            .filter_map(|record| record.binding().map(str::to_string))
            .collect())
    }
}
