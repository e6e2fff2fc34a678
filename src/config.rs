use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::category::AttachmentCategory;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub reconcile: ReconcileConfig,
    /// Maximum upload size in bytes
    pub max_upload_size: u64,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the binding database
    pub data_dir: String,
    /// Parent directory of every category's storage root
    pub upload_root: String,
}

#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Orphans modified more recently than this are never deleted
    pub grace_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./data".to_string(),
            upload_root: "./uploads".to_string(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { grace_seconds: 600 }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            reconcile: ReconcileConfig::default(),
            max_upload_size: 50 * 1024 * 1024, // 50MB
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let data_dir = std::env::var("DATA_DIR").unwrap_or(defaults.storage.data_dir);

        let upload_root = std::env::var("UPLOAD_ROOT").unwrap_or(defaults.storage.upload_root);

        let max_upload_size = std::env::var("MAX_UPLOAD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_upload_size);

        let grace_seconds = std::env::var("RECONCILE_GRACE_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.reconcile.grace_seconds);

        let config = Config {
            storage: StorageConfig {
                data_dir,
                upload_root,
            },
            reconcile: ReconcileConfig { grace_seconds },
            max_upload_size,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.data_dir.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "DATA_DIR cannot be empty".to_string(),
            ));
        }

        if self.storage.upload_root.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "UPLOAD_ROOT cannot be empty".to_string(),
            ));
        }

        if self.max_upload_size == 0 {
            return Err(ConfigError::ValidationError(
                "MAX_UPLOAD_SIZE must be greater than 0".to_string(),
            ));
        }

        if self.reconcile.grace_seconds == 0 {
            tracing::warn!(
                "RECONCILE_GRACE_SECONDS is 0. Files staged by in-flight uploads \
                 may be swept before their records are committed."
            );
        }

        Ok(())
    }

    pub fn reconcile_grace(&self) -> Duration {
        Duration::from_secs(self.reconcile.grace_seconds)
    }

    /// The attachment categories served, rooted under `upload_root`.
    pub fn categories(&self) -> Vec<AttachmentCategory> {
        AttachmentCategory::builtin(Path::new(&self.storage.upload_root))
    }
}
