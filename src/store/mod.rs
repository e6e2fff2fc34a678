mod local;

pub use local::LocalStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Entries that platforms and tooling drop into upload directories.
/// They are never attachments and never reported by `list`.
pub const IGNORED_ENTRIES: &[&str] = &[".DS_Store", ".gitignore", "Thumbs.db", "desktop.ini"];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Attachment not found: {0}")]
    NotFound(String),
    #[error("Attachment already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid attachment name: {0:?}")]
    InvalidName(String),
}

/// Persistence for the files of one attachment category.
///
/// Names are opaque and flat: a store never creates subdirectories and never
/// overwrites an existing file.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Write a new file. Fails with `AlreadyExists` instead of overwriting.
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StoreError>;
    async fn get(&self, name: &str) -> Result<Bytes, StoreError>;
    /// Delete a file. Returns `NotFound` if it was already absent.
    async fn remove(&self, name: &str) -> Result<(), StoreError>;
    /// Every attachment currently present, sorted by name.
    async fn list(&self) -> Result<Vec<String>, StoreError>;
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;
    /// Last modification time, used for the reconciliation grace window.
    async fn modified(&self, name: &str) -> Result<DateTime<Utc>, StoreError>;
}

/// Reject anything that could escape the category root or alias another entry.
pub(crate) fn check_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}
