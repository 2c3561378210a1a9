//! Error types for segmentation operations.

use thiserror::Error;

/// Result type alias for segmentation operations.
pub type Result<T> = std::result::Result<T, SegmentationError>;

/// Errors that can occur during segmentation.
#[derive(Debug, Error)]
pub enum SegmentationError {
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

    /// Pointer swap lost to a concurrent publish.
    #[error("publish conflict: {message}")]
    PublishConflict {
        /// Description of the conflicting publish.
        message: String,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid setting.
        message: String,
    },
}

impl From<strata_core::Error> for SegmentationError {
    fn from(e: strata_core::Error) -> Self {
        match e {
            strata_core::Error::Serialization { message } => Self::Serialization { message },
            strata_core::Error::PreconditionFailed { message } => Self::PublishConflict { message },
            other => Self::Storage {
                message: other.to_string(),
            },
        }
    }
}

impl From<strata_dims::DimensionError> for SegmentationError {
    fn from(e: strata_dims::DimensionError) -> Self {
        Self::Storage {
            message: e.to_string(),
        }
    }
}

impl From<strata_ingest::IngestError> for SegmentationError {
    fn from(e: strata_ingest::IngestError) -> Self {
        Self::Storage {
            message: e.to_string(),
        }
    }
}
