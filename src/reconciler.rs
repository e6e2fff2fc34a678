//! Orphan sweep for one attachment category.
//!
//! `orphans = files in the store - names bound by any owner table of the category`.
//! The sweep only ever deletes. A binding whose file is missing is counted
//! and logged as `dangling`, never repaired: the content cannot be rebuilt.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::Instrument;

use crate::category::AttachmentCategory;
use crate::storage::{BindingTable, DatabaseError};
use crate::store::{AttachmentStore, StoreError};

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("Unknown attachment category: {0}")]
    UnknownCategory(String),
    #[error("A reconciliation run is already in progress")]
    AlreadyRunning,
    #[error("Failed to load references for {category}: {source}")]
    Snapshot {
        category: String,
        #[source]
        source: DatabaseError,
    },
    #[error("Failed to list attachments for {category}: {source}")]
    Listing {
        category: String,
        #[source]
        source: StoreError,
    },
}

/// A file the sweep tried and failed to delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationReport {
    pub run_id: String,
    pub category: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Files found in the store
    pub scanned: usize,
    /// Distinct names bound by live records
    pub referenced: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Orphans spared because they are younger than the grace window
    pub skipped_recent: usize,
    /// Bound names with no file in the store
    pub dangling: usize,
    /// Deleted names, or the names that would be deleted on a dry run
    pub orphans: Vec<String>,
    pub failures: Vec<DeleteFailure>,
}

/// Sweeps one category. Holds no locks: both the reference snapshot and the
/// listing are unsynchronized point-in-time reads.
pub struct Reconciler {
    category: Arc<AttachmentCategory>,
    store: Arc<dyn AttachmentStore>,
    tables: Vec<Arc<dyn BindingTable>>,
    grace: Duration,
    dry_run: bool,
}

impl Reconciler {
    pub fn new(
        category: Arc<AttachmentCategory>,
        store: Arc<dyn AttachmentStore>,
        tables: Vec<Arc<dyn BindingTable>>,
    ) -> Self {
        debug_assert!(tables
            .iter()
            .all(|t| t.kind().category_name() == category.name));
        Self {
            category,
            store,
            tables,
            grace: Duration::ZERO,
            dry_run: false,
        }
    }

    /// Never delete files modified within `grace` of the run's start. Narrows
    /// the window in which a staged file whose commit has not landed yet can
    /// be swept.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Report orphans without deleting them.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub async fn run(&self) -> Result<ReconciliationReport, ReconcileError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "reconcile",
            category = %self.category.name,
            run_id = %run_id,
            dry_run = self.dry_run,
        );
        self.sweep(run_id).instrument(span).await
    }

    async fn sweep(&self, run_id: String) -> Result<ReconciliationReport, ReconcileError> {
        let started_at = Utc::now();
        let cutoff = chrono::Duration::from_std(self.grace)
            .ok()
            .and_then(|grace| started_at.checked_sub_signed(grace))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        // Snapshot references before listing: a file staged after the
        // snapshot is only protected by the grace window.
        let referenced = self.snapshot()?;
        let on_disk = self
            .store
            .list()
            .await
            .map_err(|source| ReconcileError::Listing {
                category: self.category.name.clone(),
                source,
            })?;

        let mut report = ReconciliationReport {
            run_id,
            category: self.category.name.clone(),
            dry_run: self.dry_run,
            started_at,
            finished_at: started_at,
            scanned: on_disk.len(),
            referenced: referenced.len(),
            deleted: 0,
            failed: 0,
            skipped_recent: 0,
            dangling: 0,
            orphans: Vec::new(),
            failures: Vec::new(),
        };

        let present: HashSet<&str> = on_disk.iter().map(String::as_str).collect();
        for name in &referenced {
            if !present.contains(name.as_str()) {
                report.dangling += 1;
                tracing::warn!(attachment = %name, "Bound attachment is missing from the store");
            }
        }

        for name in on_disk.iter().filter(|n| !referenced.contains(n.as_str())) {
            if !self.grace.is_zero() && !self.older_than(name, cutoff).await {
                report.skipped_recent += 1;
                continue;
            }

            if self.dry_run {
                tracing::info!(attachment = %name, "Would delete orphaned attachment");
                report.orphans.push(name.clone());
                continue;
            }

            match self.store.remove(name).await {
                Ok(()) => {
                    tracing::info!(attachment = %name, "Deleted orphaned attachment");
                    report.deleted += 1;
                    report.orphans.push(name.clone());
                }
                Err(StoreError::NotFound(_)) => {
                    tracing::debug!(attachment = %name, "Orphan disappeared before deletion");
                }
                Err(e) => {
                    tracing::warn!(attachment = %name, error = %e, "Failed to delete orphan");
                    report.failed += 1;
                    report.failures.push(DeleteFailure {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.finished_at = Utc::now();
        tracing::info!(
            scanned = report.scanned,
            referenced = report.referenced,
            deleted = report.deleted,
            failed = report.failed,
            skipped_recent = report.skipped_recent,
            dangling = report.dangling,
            "Reconciliation complete"
        );
        Ok(report)
    }

    fn snapshot(&self) -> Result<HashSet<String>, ReconcileError> {
        let mut referenced = HashSet::new();
        for table in &self.tables {
            let names = table
                .referenced_names()
                .map_err(|source| ReconcileError::Snapshot {
                    category: self.category.name.clone(),
                    source,
                })?;
            referenced.extend(names);
        }
        Ok(referenced)
    }

    /// Files whose age cannot be read are treated as young and spared.
    async fn older_than(&self, name: &str, cutoff: DateTime<Utc>) -> bool {
        match self.store.modified(name).await {
            Ok(modified) => modified <= cutoff,
            Err(e) => {
                tracing::debug!(attachment = %name, error = %e, "Could not read modification time");
                false
            }
        }
    }
}
