//! Shared test helpers for in-crate unit tests.

use crate::config::{Config, ReconcileConfig, StorageConfig};
use crate::coordinator::BindingCoordinator;
use crate::storage::models::OwnerKind;
use crate::storage::Database;
use crate::AppState;

/// An `AppState` over a temporary database and upload root.
pub struct TestHarness {
    pub state: AppState,
    pub db: Database,
    _dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_max_upload_size(10 * 1024 * 1024) // 10MB for tests
    }

    pub fn with_max_upload_size(max_upload_size: u64) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");

        let config = Config {
            storage: StorageConfig {
                data_dir: dir.path().join("data").to_string_lossy().to_string(),
                upload_root: dir.path().join("uploads").to_string_lossy().to_string(),
            },
            reconcile: ReconcileConfig { grace_seconds: 0 },
            max_upload_size,
        };

        let state = AppState::open(config).expect("Failed to open test state");
        let db = state.db.clone();
        Self {
            state,
            db,
            _dir: dir,
        }
    }

    pub fn coordinator(&self, kind: OwnerKind) -> &BindingCoordinator {
        self.state
            .coordinator(kind)
            .expect("every owner kind has a coordinator")
    }

    /// Names currently present in a category's store.
    pub async fn store_names(&self, category: &str) -> Vec<String> {
        self.state
            .store(category)
            .expect("unknown category")
            .list()
            .await
            .expect("Failed to list store")
    }
}
