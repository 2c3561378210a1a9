//! # strata-core
//!
//! Core abstractions for the strata dimensional warehouse.
//!
//! This crate provides the foundational types and traits used across all
//! strata components:
//!
//! - **Identifiers**: Strongly-typed surrogate and run IDs
//! - **Storage**: Abstract object-storage interface with conditional writes
//! - **Locking**: Single-writer lock over storage for commit sections
//! - **Canonical JSON**: Deterministic encoding for snapshots and digests
//! - **Paths**: The warehouse object layout
//! - **Error Types**: Shared error definitions and result types
//!
//! ## Crate Boundary
//!
//! `strata-core` is the only crate allowed to define shared primitives.
//! The dimension, ingestion, and segmentation crates depend on it and on
//! nothing else inside the workspace.
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let key = SurrogateKey::generate();
//! let run = RunId::generate();
//! assert_ne!(key.to_string(), run.to_string());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod canonical;
pub mod error;
pub mod fs;
pub mod id;
pub mod lock;
pub mod observability;
pub mod paths;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use strata_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::canonical::{canonical_json_bytes, sha256_hex};
    pub use crate::error::{Error, Result};
    pub use crate::fs::FsBackend;
    pub use crate::id::{RunId, SurrogateKey};
    pub use crate::lock::{LockGuard, LockInfo, StoreLock};
    pub use crate::paths::WarehousePaths;
    pub use crate::storage::{
        MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult,
    };
}

pub use canonical::{canonical_json_bytes, sha256_hex};
pub use error::{Error, Result};
pub use fs::FsBackend;
pub use id::{RunId, SurrogateKey};
pub use lock::{LockGuard, LockInfo, StoreLock};
pub use observability::{init_logging, LogFormat};
pub use paths::WarehousePaths;
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend, WritePrecondition, WriteResult};
