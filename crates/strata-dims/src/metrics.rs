//! Dimension metrics.
//!
//! Counters for versioning runs. These complement the structured logging
//! already in place.

use metrics::{counter, describe_counter};

use crate::scd::RejectReason;

/// Version actions counter (bootstrap / passthrough / new_version).
pub const VERSION_ACTIONS: &str = "strata_dim_version_actions_total";

/// Rejected records counter.
pub const RECORDS_REJECTED: &str = "strata_dim_records_rejected_total";

/// Registers all dimension metric descriptions.
///
/// Call once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(VERSION_ACTIONS, "Total versioning actions applied");
    describe_counter!(RECORDS_REJECTED, "Total customer records rejected");
}

/// Records one applied versioning action.
pub fn record_version_action(action: &'static str) {
    counter!(VERSION_ACTIONS, "action" => action).increment(1);
}

/// Records one rejected customer record.
pub fn record_reject(reason: RejectReason) {
    counter!(RECORDS_REJECTED, "reason" => reason.as_str()).increment(1);
}
