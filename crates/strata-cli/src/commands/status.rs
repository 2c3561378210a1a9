//! Status command - summarize warehouse state.

use anyhow::Result;
use clap::Args;

use strata_dims::DimensionStore;
use strata_ingest::{FactStore, WatermarkStore};
use strata_segment::SegmentationEngine;

use crate::{Config, OutputFormat};

/// Arguments for the status command.
#[derive(Debug, Args)]
pub struct StatusArgs {}

/// Execute the status command.
///
/// Everything here is a read: absent static dimensions report as
/// uninitialized rather than erroring, so `status` works against a fresh
/// data directory.
///
/// # Errors
///
/// Returns an error if the version table, fact store, watermark, or
/// published snapshot cannot be read.
pub async fn execute(_args: &StatusArgs, config: &Config) -> Result<()> {
    let dims = DimensionStore::new(config.storage.clone());
    let (customers, _) = dims.load_customers().await?;
    let calendar = dims.load_calendar().await.ok();
    let categories = dims.load_categories().await.ok();

    let fact_count = FactStore::new(config.storage.clone()).count().await?;
    let watermark = WatermarkStore::new(config.storage.clone())
        .load()
        .await?
        .map(|(wm, _)| wm);

    let segments = SegmentationEngine::new(config.storage.clone());
    let published = segments.load_current().await?;

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "customerVersions": customers.len(),
                    "customers": customers.customer_count(),
                    "calendarDays": calendar.as_ref().map(strata_dims::CalendarDimension::len),
                    "categories": categories.as_ref().map(strata_dims::CategoryDimension::len),
                    "facts": fact_count,
                    "watermark": watermark.as_ref().map(|wm| wm.high_water),
                    "segmentation": published.as_ref().map(|snapshot| serde_json::json!({
                        "asOf": snapshot.as_of,
                        "customersScored": snapshot.assignments.len(),
                        "runId": snapshot.run_id,
                    })),
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Warehouse status");
            match &calendar {
                Some(cal) => println!("  Calendar:   {} days ({} to {})", cal.len(), cal.start, cal.end),
                None => println!("  Calendar:   (not initialized)"),
            }
            match &categories {
                Some(cats) => println!("  Categories: {}", cats.len()),
                None => println!("  Categories: (not initialized)"),
            }
            println!(
                "  Customers:  {} versions across {} customers",
                customers.len(),
                customers.customer_count()
            );
            println!("  Facts:      {fact_count}");
            match &watermark {
                Some(wm) => println!("  Watermark:  {}", wm.high_water),
                None => println!("  Watermark:  (unset)"),
            }
            match &published {
                Some(snapshot) => println!(
                    "  Segments:   {} customers scored as of {}",
                    snapshot.assignments.len(),
                    snapshot.as_of
                ),
                None => println!("  Segments:   (never published)"),
            }
        }
    }

    Ok(())
}
