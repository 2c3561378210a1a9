//! # strata-segment
//!
//! Rolling-window segmentation engine for the strata warehouse.
//!
//! Each run recomputes one behavioral label per customer from trailing
//! and prior windows of fact history:
//!
//! - **Window aggregates**: trailing/prior spend sums, trend percentage,
//!   monthly average, category-group mix, tenure
//! - **Decision list**: priority-ordered `(predicate, label)` rules,
//!   first match wins, thresholds from configuration
//! - **Full replace**: the whole assignment relation is written as an
//!   immutable snapshot and published by an atomic pointer swap - readers
//!   never observe a partially rebuilt relation
//!
//! A customer with zero facts is absent from the output; absence, not a
//! default label, is what signals "insufficient data". A prior-window sum
//! of exactly zero makes the trend undefined, which routes the customer
//! past every trend-dependent rule.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod rules;
pub mod window;

pub use activity::{compute_activities, CustomerActivity};
pub use config::SegmentationConfig;
pub use engine::{
    SegmentAssignment, SegmentPointer, SegmentSnapshot, SegmentationEngine, SegmentationSummary,
};
pub use error::{Result, SegmentationError};
pub use rules::{decision_list, SegmentLabel, SegmentRule};
pub use window::RollingWindow;
