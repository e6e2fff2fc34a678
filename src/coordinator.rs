//! Binding coordinator: keeps one owner table and one attachment store in step.
//!
//! Every mutation runs up to three phases, strictly in order:
//!
//! 1. **Stage**: validate the upload and write it under a fresh name.
//! 2. **Commit**: one database write that inserts, re-points or deletes the
//!    owning record's binding.
//! 3. **Retire**: best-effort removal of the file the binding used to name.
//!
//! A Stage failure leaves both stores untouched. A Commit failure leaves at
//! most one unreferenced staged file, which is left for the reconciler. A
//! Retire failure is logged and never changes the outcome.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;

use crate::category::AttachmentCategory;
use crate::naming::{generate_name, is_valid_owner_id, next_disambiguator};
use crate::storage::models::{Fields, OwnerKind, OwnerRecord, Patch};
use crate::storage::{BindingTable, DatabaseError};
use crate::store::{AttachmentStore, StoreError};
use crate::validator::{self, UnsupportedMediaType};

#[derive(Debug, Error)]
pub enum BindingError {
    #[error(transparent)]
    UnsupportedMediaType(#[from] UnsupportedMediaType),
    #[error("File of {size} bytes exceeds the maximum upload size of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },
    #[error("An attachment is required to create a {0}")]
    AttachmentRequired(OwnerKind),
    #[error("Invalid owner id: {0:?}")]
    InvalidOwnerId(String),
    #[error("{kind} {owner_id} not found")]
    OwnerNotFound { kind: OwnerKind, owner_id: String },
    #[error("{kind} {owner_id} already exists")]
    OwnerExists { kind: OwnerKind, owner_id: String },
    #[error("Nothing to update: neither fields nor an attachment were provided")]
    EmptyUpdate,
    #[error("Failed to store attachment: {0}")]
    Stage(#[source] StoreError),
    #[error("Failed to commit binding for {owner_id}: {source}")]
    Commit {
        owner_id: String,
        /// File written by Stage that no record references now
        staged: Option<String>,
        #[source]
        source: DatabaseError,
    },
    #[error("Failed to load {owner_id}: {source}")]
    Lookup {
        owner_id: String,
        #[source]
        source: DatabaseError,
    },
}

impl BindingError {
    /// Whether the caller can fix the request and retry.
    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            BindingError::UnsupportedMediaType(_)
                | BindingError::PayloadTooLarge { .. }
                | BindingError::AttachmentRequired(_)
                | BindingError::InvalidOwnerId(_)
                | BindingError::OwnerNotFound { .. }
                | BindingError::OwnerExists { .. }
                | BindingError::EmptyUpdate
        )
    }

    /// Message safe to show an end user. Internal failures get a generic text;
    /// the detail belongs in the logs.
    pub fn user_message(&self) -> String {
        match self {
            BindingError::Stage(_) => {
                "The attachment could not be saved. Please try again.".to_string()
            }
            BindingError::Commit { .. } | BindingError::Lookup { .. } => {
                "The record could not be saved. Please try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// An uploaded file as handed over by the upload layer.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Media type declared by the client
    pub media_type: String,
    /// Client-side file name, used only to cross-check the extension
    pub file_name: Option<String>,
    pub data: Bytes,
}

impl Upload {
    pub fn new(media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            media_type: media_type.into(),
            file_name: None,
            data: data.into(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// What happened to the previously bound file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RetireOutcome {
    /// No file needed retiring
    Nothing,
    Removed { name: String },
    /// The file was already gone
    AlreadyGone { name: String },
    /// Removal failed; the file is now an orphan for the reconciler
    Failed { name: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingResult {
    pub owner_id: String,
    /// The record's binding after the mutation
    pub attachment: Option<String>,
    pub retired: RetireOutcome,
}

/// Coordinates the binding between one owner kind and its category's store.
pub struct BindingCoordinator {
    category: Arc<AttachmentCategory>,
    store: Arc<dyn AttachmentStore>,
    table: Arc<dyn BindingTable>,
    max_upload_size: u64,
}

impl BindingCoordinator {
    pub fn new(
        category: Arc<AttachmentCategory>,
        store: Arc<dyn AttachmentStore>,
        table: Arc<dyn BindingTable>,
        max_upload_size: u64,
    ) -> Self {
        debug_assert_eq!(table.kind().category_name(), category.name);
        Self {
            category,
            store,
            table,
            max_upload_size,
        }
    }

    pub fn category(&self) -> &AttachmentCategory {
        &self.category
    }

    pub fn kind(&self) -> OwnerKind {
        self.table.kind()
    }

    /// Create an owning record, optionally bound to a new attachment.
    pub async fn handle_create(
        &self,
        owner_id: &str,
        fields: Fields,
        file: Option<Upload>,
    ) -> Result<BindingResult, BindingError> {
        self.check_owner_id(owner_id)?;
        if file.is_none() && self.category.required_on_create {
            return Err(BindingError::AttachmentRequired(self.kind()));
        }
        if self.lookup(owner_id)?.is_some() {
            return Err(self.owner_exists(owner_id));
        }

        let staged = match file {
            Some(upload) => Some(self.stage(owner_id, upload).await?),
            None => None,
        };

        let record = OwnerRecord::new(self.kind(), owner_id, staged.clone(), fields);
        match self.table.insert(&record) {
            Ok(true) => {}
            Ok(false) => {
                self.log_orphaned(owner_id, staged.as_deref(), "owner created concurrently");
                return Err(self.owner_exists(owner_id));
            }
            Err(source) => return Err(self.commit_failed(owner_id, staged, source)),
        }

        tracing::debug!(
            kind = %self.kind(),
            owner_id,
            attachment = ?staged,
            "Created owner"
        );

        Ok(BindingResult {
            owner_id: owner_id.to_string(),
            attachment: staged,
            retired: RetireOutcome::Nothing,
        })
    }

    /// Update an owning record. With a file, the binding moves to a newly
    /// staged attachment and the old one is retired; without, the binding is
    /// left alone and only `fields` are written.
    pub async fn handle_update(
        &self,
        owner_id: &str,
        fields: Option<Fields>,
        file: Option<Upload>,
    ) -> Result<BindingResult, BindingError> {
        self.check_owner_id(owner_id)?;
        if fields.is_none() && file.is_none() {
            return Err(BindingError::EmptyUpdate);
        }
        if self.lookup(owner_id)?.is_none() {
            return Err(self.owner_not_found(owner_id));
        }

        let staged = match file {
            Some(upload) => Some(self.stage(owner_id, upload).await?),
            None => None,
        };

        let patch = match staged.as_deref() {
            Some(name) => Patch::Value(name),
            None => Patch::Absent,
        };

        // The previous binding is read inside the commit transaction, so a
        // concurrent update that landed in between is the one retired here.
        let previous = match self.table.update(owner_id, fields.as_ref(), patch) {
            Ok(Some(previous)) => previous.filter(|name| !name.is_empty()),
            Ok(None) => {
                self.log_orphaned(owner_id, staged.as_deref(), "owner deleted concurrently");
                return Err(self.owner_not_found(owner_id));
            }
            Err(source) => return Err(self.commit_failed(owner_id, staged, source)),
        };

        let retired = match (&staged, &previous) {
            (Some(new), Some(old)) if new != old => self.retire(owner_id, old).await,
            _ => RetireOutcome::Nothing,
        };

        tracing::debug!(
            kind = %self.kind(),
            owner_id,
            attachment = ?staged,
            "Updated owner"
        );

        Ok(BindingResult {
            owner_id: owner_id.to_string(),
            attachment: staged.or(previous),
            retired,
        })
    }

    /// Delete an owning record, then retire the file it referenced. Deleting
    /// an owner that does not exist succeeds and retires nothing.
    pub async fn handle_delete(&self, owner_id: &str) -> Result<BindingResult, BindingError> {
        self.check_owner_id(owner_id)?;

        let removed = self
            .table
            .delete(owner_id)
            .map_err(|source| self.commit_failed(owner_id, None, source))?;

        let retired = match removed.as_ref().and_then(OwnerRecord::binding) {
            Some(name) => self.retire(owner_id, name).await,
            None => RetireOutcome::Nothing,
        };

        tracing::debug!(
            kind = %self.kind(),
            owner_id,
            existed = removed.is_some(),
            "Deleted owner"
        );

        Ok(BindingResult {
            owner_id: owner_id.to_string(),
            attachment: None,
            retired,
        })
    }

    // ========================================================================
    // Phases
    // ========================================================================

    async fn stage(&self, owner_id: &str, upload: Upload) -> Result<String, BindingError> {
        let size = upload.data.len() as u64;
        if size > self.max_upload_size {
            return Err(BindingError::PayloadTooLarge {
                size,
                limit: self.max_upload_size,
            });
        }

        let accepted = validator::validate(
            &self.category,
            &upload.media_type,
            upload.file_name.as_deref(),
        )?;
        let name = generate_name(&self.category, owner_id, accepted, next_disambiguator());

        self.store
            .put(&name, upload.data)
            .await
            .map_err(BindingError::Stage)?;

        tracing::debug!(
            category = %self.category.name,
            owner_id,
            attachment = %name,
            byte_size = size,
            "Staged attachment"
        );
        Ok(name)
    }

    async fn retire(&self, owner_id: &str, name: &str) -> RetireOutcome {
        match self.store.remove(name).await {
            Ok(()) => {
                tracing::debug!(
                    category = %self.category.name,
                    owner_id,
                    attachment = %name,
                    "Retired attachment"
                );
                RetireOutcome::Removed {
                    name: name.to_string(),
                }
            }
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(
                    category = %self.category.name,
                    owner_id,
                    attachment = %name,
                    "Retired attachment was already absent"
                );
                RetireOutcome::AlreadyGone {
                    name: name.to_string(),
                }
            }
            Err(e) => {
                tracing::warn!(
                    category = %self.category.name,
                    owner_id,
                    attachment = %name,
                    error = %e,
                    "Failed to retire attachment; leaving it for reconciliation"
                );
                RetireOutcome::Failed {
                    name: name.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn check_owner_id(&self, owner_id: &str) -> Result<(), BindingError> {
        if is_valid_owner_id(owner_id) {
            Ok(())
        } else {
            Err(BindingError::InvalidOwnerId(owner_id.to_string()))
        }
    }

    fn lookup(&self, owner_id: &str) -> Result<Option<OwnerRecord>, BindingError> {
        self.table
            .get(owner_id)
            .map_err(|source| BindingError::Lookup {
                owner_id: owner_id.to_string(),
                source,
            })
    }

    fn owner_exists(&self, owner_id: &str) -> BindingError {
        BindingError::OwnerExists {
            kind: self.kind(),
            owner_id: owner_id.to_string(),
        }
    }

    fn owner_not_found(&self, owner_id: &str) -> BindingError {
        BindingError::OwnerNotFound {
            kind: self.kind(),
            owner_id: owner_id.to_string(),
        }
    }

    fn commit_failed(
        &self,
        owner_id: &str,
        staged: Option<String>,
        source: DatabaseError,
    ) -> BindingError {
        self.log_orphaned(owner_id, staged.as_deref(), "commit failed");
        BindingError::Commit {
            owner_id: owner_id.to_string(),
            staged,
            source,
        }
    }

    fn log_orphaned(&self, owner_id: &str, staged: Option<&str>, reason: &str) {
        if let Some(name) = staged {
            tracing::warn!(
                category = %self.category.name,
                owner_id,
                attachment = %name,
                reason,
                "Staged attachment left unreferenced"
            );
        }
    }
}
