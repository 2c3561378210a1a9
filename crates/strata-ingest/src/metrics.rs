//! Ingestion metrics.
//!
//! Counters for fact ingestion runs, complementing the structured logs.

use metrics::{counter, describe_counter};

use crate::resolver::RejectReason;

/// Facts appended counter.
pub const FACTS_APPENDED: &str = "strata_ingest_facts_appended_total";

/// Facts rejected counter.
pub const FACTS_REJECTED: &str = "strata_ingest_facts_rejected_total";

/// Ingestion run outcome counter.
pub const INGEST_RUNS: &str = "strata_ingest_runs_total";

/// Registers all ingestion metric descriptions.
///
/// Call once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(FACTS_APPENDED, "Total fact rows appended");
    describe_counter!(FACTS_REJECTED, "Total staged facts excluded");
    describe_counter!(INGEST_RUNS, "Total ingestion runs by outcome");
}

/// Records appended fact rows.
pub fn record_appended(count: u64) {
    counter!(FACTS_APPENDED).increment(count);
}

/// Records one excluded staged fact.
pub fn record_rejected(reason: RejectReason) {
    counter!(FACTS_REJECTED, "reason" => reason.as_str()).increment(1);
}

/// Records an ingestion run outcome.
pub fn record_run(outcome: &'static str) {
    counter!(INGEST_RUNS, "outcome" => outcome).increment(1);
}
