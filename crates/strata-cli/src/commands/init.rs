//! Init command - materialize the static dimensions.

use anyhow::{ensure, Result};
use chrono::NaiveDate;
use clap::Args;

use strata_dims::{CalendarDimension, CategoryDimension, DimensionStore};

use crate::{Config, OutputFormat};

/// Arguments for the init command.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// First day of the calendar range.
    #[arg(long, default_value = "2020-01-01")]
    pub calendar_start: NaiveDate,

    /// Last day of the calendar range (inclusive).
    #[arg(long, default_value = "2030-12-31")]
    pub calendar_end: NaiveDate,
}

/// Execute the init command.
///
/// Idempotent: existing calendar and category documents are left
/// untouched.
///
/// # Errors
///
/// Returns an error if the calendar range is inverted or storage fails.
pub async fn execute(args: InitArgs, config: &Config) -> Result<()> {
    ensure!(
        args.calendar_start <= args.calendar_end,
        "calendar range is inverted: {} > {}",
        args.calendar_start,
        args.calendar_end
    );

    let calendar = CalendarDimension::build(args.calendar_start, args.calendar_end);
    let categories = CategoryDimension::standard();

    let store = DimensionStore::new(config.storage.clone());
    store.initialize(&calendar, &categories).await?;

    match config.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "calendarDays": calendar.len(),
                    "calendarStart": args.calendar_start,
                    "calendarEnd": args.calendar_end,
                    "categories": categories.len(),
                }))?
            );
        }
        OutputFormat::Text => {
            println!("Warehouse initialized");
            println!(
                "  Calendar:   {} days ({} to {})",
                calendar.len(),
                args.calendar_start,
                args.calendar_end
            );
            println!("  Categories: {}", categories.len());
        }
    }

    Ok(())
}
