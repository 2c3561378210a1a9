//! # strata-ingest
//!
//! Fact ingestion engine for the strata warehouse.
//!
//! This crate implements the incremental fact load path:
//!
//! - **Watermark selection**: only source records with an ingestion
//!   timestamp strictly greater than the stored watermark are processed
//! - **Foreign-key resolution**: facts link to customer versions in
//!   current-state or point-in-time mode, and to the static category and
//!   calendar dimensions
//! - **Quality gate**: unresolvable facts are excluded and tallied; the
//!   run fails only above a configured rejection-rate threshold
//! - **Partitioned append**: valid facts are grouped by event date and
//!   written one object per partition, a range-scan hint for downstream
//!   readers
//!
//! ## Consistency model
//!
//! A run executes entirely under the ingest lock: read watermark, append
//! partitions, commit the advanced watermark via CAS. Two concurrent
//! invocations can never both append the same source window - the loser
//! of the CAS aborts and cleans up its partition objects.
//!
//! Re-running against an unchanged watermark selects zero records.
//! Rolling the watermark back (see [`watermark::WatermarkStore::reset`])
//! replays source records and inserts duplicate rows unless the caller
//! dedupes by transaction ID; the engine is deliberately stateless about
//! prior runs.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod engine;
pub mod error;
pub mod fact;
pub mod metrics;
pub mod resolver;
pub mod store;
pub mod watermark;

pub use engine::{IngestionConfig, IngestionEngine, IngestionSummary};
pub use error::{IngestError, Result};
pub use fact::{Channel, FactRow, StagedFact, TransactionStatus};
pub use resolver::{FactResolver, LinkMode, RejectReason};
pub use store::FactStore;
pub use watermark::{Watermark, WatermarkStart, WatermarkStore};
