use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::{check_name, AttachmentStore, StoreError, IGNORED_ENTRIES};

/// Filesystem attachment store rooted at one category directory.
pub struct LocalStore {
    base_path: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, std::io::Error> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn attachment_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        check_name(name)?;
        Ok(self.base_path.join(name))
    }
}

fn not_found_or(name: &str, e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound(name.to_string())
    } else {
        StoreError::Io(e)
    }
}

#[async_trait]
impl AttachmentStore for LocalStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StoreError> {
        let path = self.attachment_path(name)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::AlreadyExists {
                    StoreError::AlreadyExists(name.to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            // A truncated file must not look like a complete attachment.
            if let Err(cleanup) = tokio::fs::remove_file(&path).await {
                tracing::warn!(
                    attachment = %name,
                    error = %cleanup,
                    "Failed to remove partial attachment"
                );
            }
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Bytes, StoreError> {
        let path = self.attachment_path(name)?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or(name, e))?;
        Ok(Bytes::from(data))
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.attachment_path(name)?;
        tokio::fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or(name, e))
    }

    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.base_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                tracing::warn!(path = %entry.path().display(), "Skipping non UTF-8 file name");
                continue;
            };
            if IGNORED_ENTRIES.contains(&name.as_str()) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.attachment_path(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn modified(&self, name: &str) -> Result<DateTime<Utc>, StoreError> {
        let path = self.attachment_path(name)?;
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|e| not_found_or(name, e))?;
        Ok(DateTime::<Utc>::from(metadata.modified()?))
    }
}
