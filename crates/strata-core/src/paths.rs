//! Warehouse object layout.
//!
//! All object keys used by the engines are derived here so the layout has
//! a single owner. The layout:
//!
//! ```text
//! dims/customer/versions.json        # SCD2 version table snapshot
//! dims/date/calendar.json            # static calendar dimension
//! dims/category/categories.json      # static merchant-category dimension
//! facts/_watermark.json              # ingestion watermark document
//! facts/date=YYYY-MM-DD/{run}.json   # fact partition objects
//! segments/runs/{run}.json           # immutable segmentation snapshots
//! segments/current.json              # pointer to the published snapshot
//! locks/dims.lock                    # versioning commit lock
//! locks/ingest.lock                  # watermark/append lock
//! ```

use chrono::NaiveDate;

use crate::id::RunId;

/// Prefix for fact partition objects.
pub const FACTS_PREFIX: &str = "facts/date=";

/// Derives every object key in the warehouse.
#[derive(Debug, Clone, Default)]
pub struct WarehousePaths;

impl WarehousePaths {
    /// Creates the path layout.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Path of the customer version-table snapshot.
    #[must_use]
    pub fn customer_versions(&self) -> String {
        "dims/customer/versions.json".to_string()
    }

    /// Path of the calendar dimension document.
    #[must_use]
    pub fn calendar(&self) -> String {
        "dims/date/calendar.json".to_string()
    }

    /// Path of the merchant-category dimension document.
    #[must_use]
    pub fn categories(&self) -> String {
        "dims/category/categories.json".to_string()
    }

    /// Path of the ingestion watermark document.
    #[must_use]
    pub fn watermark(&self) -> String {
        "facts/_watermark.json".to_string()
    }

    /// Prefix under which all fact partitions live.
    #[must_use]
    pub fn facts_prefix(&self) -> String {
        FACTS_PREFIX.to_string()
    }

    /// Prefix for one event-date partition.
    #[must_use]
    pub fn fact_partition_prefix(&self, event_date: NaiveDate) -> String {
        format!("{FACTS_PREFIX}{}/", event_date.format("%Y-%m-%d"))
    }

    /// Path of one fact partition object written by `run_id`.
    #[must_use]
    pub fn fact_partition_object(&self, event_date: NaiveDate, run_id: RunId) -> String {
        format!(
            "{FACTS_PREFIX}{}/{run_id}.json",
            event_date.format("%Y-%m-%d")
        )
    }

    /// Path of one immutable segmentation snapshot.
    #[must_use]
    pub fn segment_run(&self, run_id: RunId) -> String {
        format!("segments/runs/{run_id}.json")
    }

    /// Path of the segmentation pointer document.
    #[must_use]
    pub fn segment_pointer(&self) -> String {
        "segments/current.json".to_string()
    }

    /// Path of the dimension commit lock.
    #[must_use]
    pub fn dims_lock(&self) -> String {
        "locks/dims.lock".to_string()
    }

    /// Path of the ingestion lock.
    #[must_use]
    pub fn ingest_lock(&self) -> String {
        "locks/ingest.lock".to_string()
    }

    /// Parses the event date out of a fact partition object path.
    ///
    /// Returns `None` for paths outside the fact layout.
    #[must_use]
    pub fn fact_partition_date(path: &str) -> Option<NaiveDate> {
        let rest = path.strip_prefix(FACTS_PREFIX)?;
        let (date_str, _) = rest.split_once('/')?;
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()
    }
}
