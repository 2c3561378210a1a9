//! The dimension versioning manager.
//!
//! Applies a batch of cleaned customer records to the version table with
//! type-2 slowly-changing-dimension semantics. Per natural key, exactly
//! one of three actions:
//!
//! - **Bootstrap** - first sighting: insert the initial version opening at
//!   the account-open date
//! - **Pass-through overwrite** - tracked digest unchanged: overwrite
//!   pass-through attributes in place, boundaries untouched
//! - **New version** - tracked digest differs: close the current version
//!   the day before the effective date and insert a new open version
//!
//! Records are applied in ascending `sequence` order, so a batch carrying
//! the same customer twice resolves deterministically regardless of
//! arrival order. Malformed keys and out-of-order effective dates reject
//! the single record and the batch continues.

use tracing::warn;

use serde::{Deserialize, Serialize};

use crate::error::{DimensionError, Result};
use crate::metrics::{record_reject, record_version_action};
use crate::record::CustomerRecord;
use crate::version::{CustomerDimension, CustomerVersion};

/// Why a record was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Natural key missing or malformed.
    InvalidKey,
    /// Effective date precedes (or collides with) the current version's
    /// `valid_from`; applying it would corrupt the interval chain.
    OutOfOrder,
}

impl RejectReason {
    /// Returns the reason as a metric/label string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid_key",
            Self::OutOfOrder => "out_of_order",
        }
    }
}

/// Machine-readable outcome of one versioning run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersioningSummary {
    /// Records in the input batch.
    pub rows_processed: usize,
    /// First sightings inserted.
    pub bootstraps: usize,
    /// Versions closed + reopened on tracked change.
    pub new_versions: usize,
    /// In-place pass-through overwrites.
    pub passthrough_updates: usize,
    /// Records rejected for a malformed natural key.
    pub rejected_invalid_key: usize,
    /// Records rejected as out-of-order updates.
    pub rejected_out_of_order: usize,
    /// Version rows in the table after the run.
    pub table_rows: usize,
    /// Distinct customers in the table after the run.
    pub customers: usize,
}

impl VersioningSummary {
    /// Total rejected records.
    #[must_use]
    pub fn rejected(&self) -> usize {
        self.rejected_invalid_key + self.rejected_out_of_order
    }
}

/// Applies cleaned customer batches to the version table.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersioningManager;

impl VersioningManager {
    /// Creates a versioning manager.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Applies an incremental batch to the table in place.
    ///
    /// Records are applied in ascending `sequence` order. Per-record
    /// failures reject only that record; the batch continues.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::CorruptChain`] if the resulting table
    /// fails the SCD2 invariant check - the caller must not commit it.
    pub fn apply_batch(
        &self,
        dimension: &mut CustomerDimension,
        mut batch: Vec<CustomerRecord>,
    ) -> Result<VersioningSummary> {
        batch.sort_by_key(|r| r.sequence);

        let mut summary = VersioningSummary {
            rows_processed: batch.len(),
            ..VersioningSummary::default()
        };

        for record in batch {
            self.apply_record(dimension, &record, &mut summary)?;
        }

        dimension.check_invariants()?;
        summary.table_rows = dimension.len();
        summary.customers = dimension.customer_count();
        Ok(summary)
    }

    /// Bootstrap-only full refresh: every input row is a first sighting.
    ///
    /// Duplicate natural keys in the batch collapse onto the row with the
    /// highest `sequence`. Refuses to run against a non-empty table; a
    /// populated dimension only moves forward through incremental batches.
    ///
    /// # Errors
    ///
    /// Returns [`DimensionError::NotEmpty`] when the table already has
    /// rows, or [`DimensionError::CorruptChain`] if the refreshed table
    /// fails the invariant check.
    pub fn full_refresh(
        &self,
        dimension: &mut CustomerDimension,
        mut batch: Vec<CustomerRecord>,
    ) -> Result<VersioningSummary> {
        if !dimension.is_empty() {
            return Err(DimensionError::NotEmpty {
                existing_rows: dimension.len(),
            });
        }

        batch.sort_by_key(|r| r.sequence);

        let mut summary = VersioningSummary {
            rows_processed: batch.len(),
            ..VersioningSummary::default()
        };

        for record in batch {
            if !record.has_valid_key() {
                warn!(customer_id = %record.customer_id, sequence = record.sequence, "rejecting record with invalid natural key");
                record_reject(RejectReason::InvalidKey);
                summary.rejected_invalid_key += 1;
                continue;
            }
            if dimension.current_of(&record.customer_id).is_some() {
                // Later sequence wins; the batch contract is one row per
                // key, so this is a collapse, not an update.
                dimension.remove_customer(&record.customer_id);
                summary.bootstraps -= 1;
            }
            dimension.push(CustomerVersion::bootstrap(&record));
            record_version_action("bootstrap");
            summary.bootstraps += 1;
        }

        dimension.check_invariants()?;
        summary.table_rows = dimension.len();
        summary.customers = dimension.customer_count();
        Ok(summary)
    }

    fn apply_record(
        &self,
        dimension: &mut CustomerDimension,
        record: &CustomerRecord,
        summary: &mut VersioningSummary,
    ) -> Result<()> {
        if !record.has_valid_key() {
            warn!(customer_id = %record.customer_id, sequence = record.sequence, "rejecting record with invalid natural key");
            record_reject(RejectReason::InvalidKey);
            summary.rejected_invalid_key += 1;
            return Ok(());
        }

        let Some(current) = dimension.current_of(&record.customer_id) else {
            dimension.push(CustomerVersion::bootstrap(record));
            record_version_action("bootstrap");
            summary.bootstraps += 1;
            return Ok(());
        };

        let unchanged = current.tracked().digest()? == record.tracked().digest()?;
        if unchanged {
            if let Some(current) = dimension.current_of_mut(&record.customer_id) {
                current.overwrite_passthrough(record);
            }
            record_version_action("passthrough");
            summary.passthrough_updates += 1;
            return Ok(());
        }

        // Tracked change. Closing the current version at effective - 1 day
        // requires the effective date to be strictly after valid_from.
        if record.effective_date <= current.valid_from {
            warn!(
                customer_id = %record.customer_id,
                effective = %record.effective_date,
                current_from = %current.valid_from,
                "rejecting out-of-order update"
            );
            record_reject(RejectReason::OutOfOrder);
            summary.rejected_out_of_order += 1;
            return Ok(());
        }

        let last_day = record
            .effective_date
            .pred_opt()
            .ok_or_else(|| DimensionError::CorruptChain {
                customer_id: record.customer_id.clone(),
                message: format!("effective date {} has no predecessor", record.effective_date),
            })?;

        dimension.close_current(&record.customer_id, last_day);

        let mut version = CustomerVersion::bootstrap(record);
        version.valid_from = record.effective_date;
        dimension.push(version);
        record_version_action("new_version");
        summary.new_versions += 1;
        Ok(())
    }
}
