//! Dimension storage with single-writer commit semantics.
//!
//! The customer version table is one snapshot document. Mutating runs
//! follow the lock + CAS protocol:
//!
//! - Only one writer enters the critical section at a time (store lock)
//! - The snapshot commit uses CAS (`MatchesVersion` / `DoesNotExist`)
//! - A lost CAS race aborts the run; nothing partial becomes visible
//!
//! The static calendar and category dimensions are bootstrap-only
//! documents written with create-if-absent semantics.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, Instrument};

use strata_core::lock::{StoreLock, DEFAULT_LOCK_TTL, DEFAULT_MAX_RETRIES};
use strata_core::storage::{StorageBackend, WritePrecondition, WriteResult};
use strata_core::{canonical_json_bytes, observability, RunId, WarehousePaths};

use crate::calendar::CalendarDimension;
use crate::category::CategoryDimension;
use crate::error::{DimensionError, Result};
use crate::record::CustomerRecord;
use crate::scd::{VersioningManager, VersioningSummary};
use crate::version::CustomerDimension;

/// Storage-facing dimension operations.
///
/// Owns the warehouse paths, a lock instance, and the commit policy.
pub struct DimensionStore {
    storage: Arc<dyn StorageBackend>,
    paths: WarehousePaths,
    lock: StoreLock<dyn StorageBackend>,
    lock_ttl: Duration,
    lock_max_retries: u32,
}

impl DimensionStore {
    /// Creates a dimension store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        let paths = WarehousePaths::new();
        let lock = StoreLock::new(storage.clone(), paths.dims_lock());
        Self {
            storage,
            paths,
            lock,
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Sets the lock acquisition policy for this store.
    #[must_use]
    pub const fn with_lock_policy(mut self, ttl: Duration, max_retries: u32) -> Self {
        self.lock_ttl = ttl;
        self.lock_max_retries = max_retries;
        self
    }

    /// Bootstraps the static dimensions (idempotent).
    ///
    /// Writes the calendar and category documents if absent; existing
    /// documents are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if storage operations fail.
    pub async fn initialize(
        &self,
        calendar: &CalendarDimension,
        categories: &CategoryDimension,
    ) -> Result<()> {
        self.ensure_json_exists(&self.paths.calendar(), calendar)
            .await?;
        self.ensure_json_exists(&self.paths.categories(), categories)
            .await?;
        Ok(())
    }

    /// Loads the customer version table and its CAS token.
    ///
    /// An absent snapshot is an empty table with no token.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be read or parsed.
    pub async fn load_customers(&self) -> Result<(CustomerDimension, Option<String>)> {
        let path = self.paths.customer_versions();
        match self.storage.get(&path).await {
            Ok(data) => {
                let table: CustomerDimension = serde_json::from_slice(&data).map_err(|e| {
                    DimensionError::Serialization {
                        message: format!("parse {path}: {e}"),
                    }
                })?;
                let meta = self.storage.head(&path).await.map_err(DimensionError::from)?;
                Ok((table, meta.map(|m| m.version)))
            }
            Err(strata_core::Error::NotFound(_)) => Ok((CustomerDimension::new(), None)),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the calendar dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is absent or unparseable.
    pub async fn load_calendar(&self) -> Result<CalendarDimension> {
        self.read_json(&self.paths.calendar()).await
    }

    /// Loads the category dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is absent or unparseable.
    pub async fn load_categories(&self) -> Result<CategoryDimension> {
        self.read_json(&self.paths.categories()).await
    }

    /// Runs an incremental versioning batch under the dimension lock.
    ///
    /// # Errors
    ///
    /// Returns an error on lock contention, invariant violation, or a
    /// lost CAS commit; in every failure case the stored snapshot is
    /// unchanged.
    pub async fn run_batch(&self, batch: Vec<CustomerRecord>) -> Result<VersioningSummary> {
        self.run_locked(batch, false).await
    }

    /// Runs a bootstrap full refresh under the dimension lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is non-empty, on lock contention, or
    /// on a lost CAS commit.
    pub async fn run_full_refresh(&self, batch: Vec<CustomerRecord>) -> Result<VersioningSummary> {
        self.run_locked(batch, true).await
    }

    async fn run_locked(
        &self,
        batch: Vec<CustomerRecord>,
        full_refresh: bool,
    ) -> Result<VersioningSummary> {
        let run_id = RunId::generate();
        let span = observability::versioning_span(
            if full_refresh { "full_refresh" } else { "apply_batch" },
            &run_id.to_string(),
        );

        async {
            let operation = if full_refresh {
                "DimensionFullRefresh"
            } else {
                "DimensionBatch"
            };
            let lock_guard = self
                .lock
                .acquire(self.lock_ttl, self.lock_max_retries, Some(operation.into()))
                .await
                .map_err(DimensionError::from)?;

            let outcome = async {
                let (mut table, token) = self.load_customers().await?;
                let manager = VersioningManager::new();
                let summary = if full_refresh {
                    manager.full_refresh(&mut table, batch)?
                } else {
                    manager.apply_batch(&mut table, batch)?
                };
                self.commit_customers(&table, token).await?;
                Ok(summary)
            }
            .await;

            lock_guard.release().await.map_err(DimensionError::from)?;

            if let Ok(ref summary) = outcome {
                info!(
                    bootstraps = summary.bootstraps,
                    new_versions = summary.new_versions,
                    passthrough = summary.passthrough_updates,
                    rejected = summary.rejected(),
                    table_rows = summary.table_rows,
                    "versioning run committed"
                );
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn commit_customers(
        &self,
        table: &CustomerDimension,
        expected: Option<String>,
    ) -> Result<()> {
        let path = self.paths.customer_versions();
        let bytes = canonical_json_bytes(table).map_err(DimensionError::from)?;
        let precondition = match expected {
            Some(version) => WritePrecondition::MatchesVersion(version),
            None => WritePrecondition::DoesNotExist,
        };

        match self
            .storage
            .put(&path, Bytes::from(bytes), precondition)
            .await
            .map_err(DimensionError::from)?
        {
            WriteResult::Success { .. } => Ok(()),
            WriteResult::PreconditionFailed { current_version } => {
                Err(DimensionError::CommitConflict {
                    message: format!(
                        "customer snapshot advanced to version {current_version} during the run"
                    ),
                })
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let data = self.storage.get(path).await.map_err(DimensionError::from)?;
        serde_json::from_slice(&data).map_err(|e| DimensionError::Serialization {
            message: format!("parse {path}: {e}"),
        })
    }

    async fn ensure_json_exists<T: Serialize>(&self, path: &str, value: &T) -> Result<()> {
        let bytes = canonical_json_bytes(value).map_err(DimensionError::from)?;
        match self
            .storage
            .put(path, Bytes::from(bytes), WritePrecondition::DoesNotExist)
            .await
            .map_err(DimensionError::from)?
        {
            // Already bootstrapped is fine; these documents are static.
            WriteResult::Success { .. } | WriteResult::PreconditionFailed { .. } => Ok(()),
        }
    }
}
