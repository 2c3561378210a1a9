//! # strata-dims
//!
//! Dimension layer for the strata warehouse.
//!
//! This crate implements the dimension domain, providing:
//!
//! - **Customer versions**: A type-2 slowly-changing dimension over
//!   customer records, one row per version, full history preserved
//! - **Versioning manager**: Batch application of cleaned customer records
//!   (bootstrap / pass-through overwrite / new version)
//! - **Calendar dimension**: Static per-day reference table
//! - **Category dimension**: Static merchant-category lookup with
//!   business groupings
//!
//! ## Consistency model
//!
//! The customer version table is a single snapshot document. Mutations go
//! through the versioning manager only: acquire the dimension lock, load
//! the snapshot, apply the batch in memory, commit via CAS. A lost CAS
//! race aborts the run; nothing partial is ever visible.
//!
//! ## Storage Layout
//!
//! ```text
//! dims/
//! ├── customer/versions.json    # SCD2 snapshot (CAS-committed)
//! ├── date/calendar.json        # bootstrap-only
//! └── category/categories.json  # bootstrap-only
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod calendar;
pub mod category;
pub mod error;
pub mod metrics;
pub mod record;
pub mod scd;
pub mod store;
pub mod version;

pub use calendar::{date_key, CalendarDay, CalendarDimension};
pub use category::{CategoryDimension, CategoryGroup, MerchantCategory};
pub use error::{DimensionError, Result};
pub use record::{CardType, CustomerRecord, EmploymentStatus, TrackedAttributes};
pub use scd::{RejectReason, VersioningManager, VersioningSummary};
pub use store::DimensionStore;
pub use version::{CustomerDimension, CustomerVersion};
