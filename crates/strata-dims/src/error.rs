//! Error types for dimension operations.

use thiserror::Error;

/// Result type alias for dimension operations.
pub type Result<T> = std::result::Result<T, DimensionError>;

/// Errors that can occur during dimension operations.
#[derive(Debug, Error)]
pub enum DimensionError {
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

    /// CAS commit lost to a concurrent writer.
    #[error("commit conflict: {message}")]
    CommitConflict {
        /// Description of the conflicting commit.
        message: String,
    },

    /// A full refresh was requested against a non-empty version table.
    #[error("full refresh requires an empty version table, found {existing_rows} rows")]
    NotEmpty {
        /// Number of rows already in the table.
        existing_rows: usize,
    },

    /// The version table violates the SCD2 interval invariant.
    #[error("version chain corrupt for {customer_id}: {message}")]
    CorruptChain {
        /// Natural key of the broken chain.
        customer_id: String,
        /// Description of the violation.
        message: String,
    },
}

impl From<strata_core::Error> for DimensionError {
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
