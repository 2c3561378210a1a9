//! Error types for ingestion operations.

use thiserror::Error;

/// Result type alias for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Errors that can occur during fact ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Storage operation failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
    },

    /// Serialization/deserialization failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// Watermark CAS commit lost to a concurrent writer.
    #[error("commit conflict: {message}")]
    CommitConflict {
        /// Description of the conflicting commit.
        message: String,
    },

    /// The run computed a watermark at or below the stored one.
    ///
    /// Proceeding would risk silently duplicating rows, so the run
    /// refuses. Deliberate replays go through
    /// [`crate::watermark::WatermarkStore::reset`].
    #[error("watermark regression: computed watermark {computed} is not ahead of stored {stored}")]
    WatermarkRegression {
        /// The stored watermark.
        stored: chrono::DateTime<chrono::Utc>,
        /// The watermark the run computed.
        computed: chrono::DateTime<chrono::Utc>,
    },

    /// The rejection rate exceeded the configured threshold.
    ///
    /// Nothing was committed; the failed batch's source window remains
    /// unprocessed.
    #[error("rejection rate {rate:.4} exceeds threshold {max_rate:.4} ({rejected}/{selected} records)")]
    RejectionRateExceeded {
        /// Records rejected.
        rejected: usize,
        /// Records selected by the watermark.
        selected: usize,
        /// Observed rejection rate.
        rate: f64,
        /// Configured maximum rate.
        max_rate: f64,
    },
}

impl From<strata_core::Error> for IngestError {
    fn from(e: strata_core::Error) -> Self {
        match e {
            strata_core::Error::Serialization { message } => Self::Serialization { message },
            strata_core::Error::PreconditionFailed { message } => Self::CommitConflict { message },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

impl From<strata_dims::DimensionError> for IngestError {
    fn from(e: strata_dims::DimensionError) -> Self {
        Self::Storage {
            message: e.to_string(),
        }
    }
}
