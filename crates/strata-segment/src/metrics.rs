//! Segmentation metrics.

use metrics::{counter, describe_counter};

use crate::rules::SegmentLabel;

/// Customers scored counter.
pub const CUSTOMERS_SCORED: &str = "strata_segment_customers_scored_total";

/// Segmentation run outcome counter.
pub const SEGMENT_RUNS: &str = "strata_segment_runs_total";

/// Registers all segmentation metric descriptions.
///
/// Call once at application startup after initializing the metrics
/// recorder.
pub fn register_metrics() {
    describe_counter!(CUSTOMERS_SCORED, "Total customers scored, by label");
    describe_counter!(SEGMENT_RUNS, "Total segmentation runs by outcome");
}

/// Records scored customers for one label.
pub fn record_scored(label: SegmentLabel, count: u64) {
    counter!(CUSTOMERS_SCORED, "label" => label.display_name()).increment(count);
}

/// Records a segmentation run outcome.
pub fn record_run(outcome: &'static str) {
    counter!(SEGMENT_RUNS, "outcome" => outcome).increment(1);
}
