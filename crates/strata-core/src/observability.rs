//! Observability infrastructure for strata.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors for consistent
//! observability across all strata components.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for scheduled jobs).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `strata_ingest=debug`)
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .init();
            }
        }
    });
}

/// Creates a span for a dimension versioning run.
#[must_use]
pub fn versioning_span(operation: &str, run_id: &str) -> Span {
    tracing::info_span!("versioning", op = operation, run_id = run_id)
}

/// Creates a span for a fact ingestion run.
#[must_use]
pub fn ingest_span(operation: &str, run_id: &str) -> Span {
    tracing::info_span!("ingest", op = operation, run_id = run_id)
}

/// Creates a span for a segmentation run.
#[must_use]
pub fn segment_span(operation: &str, run_id: &str) -> Span {
    tracing::info_span!("segment", op = operation, run_id = run_id)
}
