use std::collections::HashSet;

use super::db::{Database, DatabaseError};
use super::models::{Fields, OwnerKind, OwnerRecord, Patch};

/// One owning-record table, seen only through its attachment binding.
///
/// Every mutating method is a single database write, so a binding is never
/// observed half-updated.
pub trait BindingTable: Send + Sync {
    fn kind(&self) -> OwnerKind;

    fn get(&self, owner_id: &str) -> Result<Option<OwnerRecord>, DatabaseError>;

    /// Insert a new record. Returns false if the id is already taken.
    fn insert(&self, record: &OwnerRecord) -> Result<bool, DatabaseError>;

    /// Returns `None` for a missing owner, otherwise the binding before the write.
    fn update(
        &self,
        owner_id: &str,
        fields: Option<&Fields>,
        attachment: Patch<&str>,
    ) -> Result<Option<Option<String>>, DatabaseError>;

    fn delete(&self, owner_id: &str) -> Result<Option<OwnerRecord>, DatabaseError>;

    /// Snapshot of every non-null binding in the table.
    fn referenced_names(&self) -> Result<HashSet<String>, DatabaseError>;
}

/// A redb-backed owner table
#[derive(Clone)]
pub struct OwnerTable {
    db: Database,
    kind: OwnerKind,
}

impl OwnerTable {
    pub fn new(db: Database, kind: OwnerKind) -> Self {
        Self { db, kind }
    }
}

impl BindingTable for OwnerTable {
    fn kind(&self) -> OwnerKind {
        self.kind
    }

    fn get(&self, owner_id: &str) -> Result<Option<OwnerRecord>, DatabaseError> {
        self.db.get_owner(self.kind, owner_id)
    }

    fn insert(&self, record: &OwnerRecord) -> Result<bool, DatabaseError> {
        debug_assert_eq!(record.kind, self.kind);
        self.db.insert_owner(record)
    }

    fn update(
        &self,
        owner_id: &str,
        fields: Option<&Fields>,
        attachment: Patch<&str>,
    ) -> Result<Option<Option<String>>, DatabaseError> {
        self.db.update_owner(self.kind, owner_id, fields, attachment)
    }

    fn delete(&self, owner_id: &str) -> Result<Option<OwnerRecord>, DatabaseError> {
        self.db.delete_owner(self.kind, owner_id)
    }

    fn referenced_names(&self) -> Result<HashSet<String>, DatabaseError> {
        self.db.referenced_attachments(self.kind)
    }
}
