//! attachment-binding - Record-owned document attachments kept consistent across
//! a filesystem store and an embedded database
//!
//! This crate provides:
//! - Per-category attachment stores on the local filesystem
//! - Declared media type validation before anything is written
//! - A Stage / Commit / Retire coordinator binding one file to one owning record
//! - An orphan reconciler that deletes files no record references

pub mod category;
pub mod config;
pub mod coordinator;
pub mod naming;
pub mod reconciler;
pub mod storage;
pub mod store;
#[cfg(test)]
pub mod testutil;
pub mod validator;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use category::CategoryRegistry;
use config::Config;
use coordinator::BindingCoordinator;
use reconciler::{ReconcileError, ReconciliationReport, Reconciler};
use storage::models::OwnerKind;
use storage::{BindingTable, Database, OwnerTable};
use store::{AttachmentStore, LocalStore};

/// A category whose sweep could not run to completion.
#[derive(Debug, Clone, Serialize)]
pub struct SweepError {
    pub category: String,
    pub error: String,
}

/// Outcome of sweeping several categories in one job.
#[derive(Debug, Default, Serialize)]
pub struct SweepSummary {
    pub reports: Vec<ReconciliationReport>,
    pub errors: Vec<SweepError>,
}

impl SweepSummary {
    /// Per-file deletion failures across every report
    pub fn failed(&self) -> usize {
        self.reports.iter().map(|r| r.failed).sum()
    }
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub db: Database,
    pub categories: CategoryRegistry,
    stores: HashMap<String, Arc<dyn AttachmentStore>>,
    tables: Vec<Arc<dyn BindingTable>>,
    coordinators: HashMap<OwnerKind, BindingCoordinator>,
    reconcile_gate: tokio::sync::Mutex<()>,
}

impl AppState {
    /// Open the database and every category store described by `config`.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let categories = CategoryRegistry::new(config.categories())?;

        let db = Database::open(&config.storage.data_dir)?;
        tracing::info!(data_dir = %config.storage.data_dir, "Database opened");

        let mut stores: HashMap<String, Arc<dyn AttachmentStore>> = HashMap::new();
        for category in categories.iter() {
            let store = LocalStore::new(&category.root)?;
            tracing::info!(
                category = %category.name,
                root = %category.root.display(),
                "Attachment store ready"
            );
            stores.insert(category.name.clone(), Arc::new(store));
        }

        let tables: Vec<Arc<dyn BindingTable>> = OwnerKind::ALL
            .into_iter()
            .map(|kind| Arc::new(OwnerTable::new(db.clone(), kind)) as Arc<dyn BindingTable>)
            .collect();

        let mut coordinators = HashMap::new();
        for table in &tables {
            let name = table.kind().category_name();
            let (Some(category), Some(store)) = (categories.get(name), stores.get(name)) else {
                anyhow::bail!("no attachment category configured for {}", table.kind());
            };
            coordinators.insert(
                table.kind(),
                BindingCoordinator::new(
                    Arc::clone(category),
                    Arc::clone(store),
                    Arc::clone(table),
                    config.max_upload_size,
                ),
            );
        }

        Ok(Self {
            config,
            db,
            categories,
            stores,
            tables,
            coordinators,
            reconcile_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// The coordinator for one owner kind.
    pub fn coordinator(&self, kind: OwnerKind) -> Option<&BindingCoordinator> {
        self.coordinators.get(&kind)
    }

    /// The attachment store backing one category.
    pub fn store(&self, category: &str) -> Option<&Arc<dyn AttachmentStore>> {
        self.stores.get(category)
    }

    /// Sweep one category using the configured grace window.
    pub async fn reconcile(&self, category: &str) -> Result<ReconciliationReport, ReconcileError> {
        self.reconcile_with(category, self.config.reconcile_grace(), false)
            .await
    }

    /// Fail with `UnknownCategory` unless every name is configured.
    pub fn check_categories<S: AsRef<str>>(&self, names: &[S]) -> Result<(), ReconcileError> {
        for name in names {
            let name: &str = name.as_ref();
            if self.categories.get(name).is_none() {
                return Err(ReconcileError::UnknownCategory(name.to_string()));
            }
        }
        Ok(())
    }

    /// Sweep several categories in order. Names are checked before anything
    /// is deleted; after that a failed sweep is recorded and the remaining
    /// categories still run, so every completed report is returned.
    pub async fn reconcile_many<S: AsRef<str>>(
        &self,
        categories: &[S],
        grace: Duration,
        dry_run: bool,
    ) -> Result<SweepSummary, ReconcileError> {
        self.check_categories(categories)?;

        let mut summary = SweepSummary::default();
        for category in categories {
            let category: &str = category.as_ref();
            match self.reconcile_with(category, grace, dry_run).await {
                Ok(report) => summary.reports.push(report),
                Err(e) => {
                    tracing::error!(category, error = %e, "Reconciliation failed");
                    summary.errors.push(SweepError {
                        category: category.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Ok(summary)
    }

    /// Sweep one category. Only one sweep runs at a time per process; a
    /// second concurrent call fails instead of queueing.
    pub async fn reconcile_with(
        &self,
        category: &str,
        grace: Duration,
        dry_run: bool,
    ) -> Result<ReconciliationReport, ReconcileError> {
        let _guard = self
            .reconcile_gate
            .try_lock()
            .map_err(|_| ReconcileError::AlreadyRunning)?;

        let (Some(definition), Some(store)) =
            (self.categories.get(category), self.stores.get(category))
        else {
            return Err(ReconcileError::UnknownCategory(category.to_string()));
        };

        let tables = self
            .tables
            .iter()
            .filter(|t| t.kind().category_name() == category)
            .cloned()
            .collect();

        Reconciler::new(Arc::clone(definition), Arc::clone(store), tables)
            .with_grace(grace)
            .with_dry_run(dry_run)
            .run()
            .await
    }
}
