//! The partitioned fact store.
//!
//! Fact rows live in one object per event-date partition per run:
//! `facts/date=YYYY-MM-DD/{run}.json`. Partitioning by event date is a
//! range-scan hint for downstream readers; it has no correctness bearing.

use bytes::Bytes;
use chrono::NaiveDate;
use std::sync::Arc;

use strata_core::storage::{StorageBackend, WritePrecondition, WriteResult};
use strata_core::{canonical_json_bytes, RunId, WarehousePaths};

use crate::error::{IngestError, Result};
use crate::fact::FactRow;

/// Read/append access to the fact partition layout.
pub struct FactStore {
    storage: Arc<dyn StorageBackend>,
    paths: WarehousePaths,
}

impl FactStore {
    /// Creates a fact store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            paths: WarehousePaths::new(),
        }
    }

    /// Appends one partition object for `run_id` and returns its path.
    ///
    /// Partition objects are immutable and run-scoped, so a retried run
    /// writes new objects instead of rewriting old ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be written, including when a
    /// same-run object already exists (runs never overwrite).
    pub async fn append_partition(
        &self,
        event_date: NaiveDate,
        run_id: RunId,
        rows: &[FactRow],
    ) -> Result<String> {
        let path = self.paths.fact_partition_object(event_date, run_id);
        let bytes = canonical_json_bytes(&rows).map_err(IngestError::from)?;

        match self
            .storage
            .put(&path, Bytes::from(bytes), WritePrecondition::DoesNotExist)
            .await
            .map_err(IngestError::from)?
        {
            WriteResult::Success { .. } => Ok(path),
            WriteResult::PreconditionFailed { .. } => Err(IngestError::CommitConflict {
                message: format!("partition object {path} already exists"),
            }),
        }
    }

    /// Deletes a set of partition objects (failed-run cleanup).
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub async fn delete_objects(&self, object_paths: &[String]) -> Result<()> {
        for path in object_paths {
            self.storage.delete(path).await.map_err(IngestError::from)?;
        }
        Ok(())
    }

    /// Scans every fact row.
    ///
    /// # Errors
    ///
    /// Returns an error if any partition object cannot be read or parsed.
    pub async fn scan_all(&self) -> Result<Vec<FactRow>> {
        self.scan_range(None, None).await
    }

    /// Scans fact rows with `from <= event_date < to`.
    ///
    /// Partition pruning happens on object paths before any object is
    /// read, which is the point of the date layout.
    ///
    /// # Errors
    ///
    /// Returns an error if any surviving partition object cannot be read
    /// or parsed.
    pub async fn scan_range(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<FactRow>> {
        let objects = self
            .storage
            .list(&self.paths.facts_prefix())
            .await
            .map_err(IngestError::from)?;

        let mut selected: Vec<(NaiveDate, String)> = objects
            .into_iter()
            .filter_map(|meta| {
                WarehousePaths::fact_partition_date(&meta.path).map(|date| (date, meta.path))
            })
            .filter(|(date, _)| from.is_none_or(|f| *date >= f))
            .filter(|(date, _)| to.is_none_or(|t| *date < t))
            .collect();
        // Deterministic read order regardless of backend listing order.
        selected.sort();

        let mut rows = Vec::new();
        for (_, path) in selected {
            let data = self.storage.get(&path).await.map_err(IngestError::from)?;
            let mut partition: Vec<FactRow> =
                serde_json::from_slice(&data).map_err(|e| IngestError::Serialization {
                    message: format!("parse {path}: {e}"),
                })?;
            rows.append(&mut partition);
        }
        Ok(rows)
    }

    /// Counts stored fact rows (status reporting).
    ///
    /// # Errors
    ///
    /// Returns an error if the scan fails.
    pub async fn count(&self) -> Result<usize> {
        Ok(self.scan_all().await?.len())
    }
}
