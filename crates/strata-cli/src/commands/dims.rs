//! Dims command - apply a customer batch to the version table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use strata_dims::DimensionStore;

use crate::input::read_customer_batch;
use crate::{Config, OutputFormat};

/// Arguments for the dims command.
#[derive(Debug, Args)]
pub struct DimsArgs {
    /// CSV batch of cleaned customer records.
    #[arg(long)]
    pub batch: PathBuf,

    /// Bootstrap full refresh: every row is a first sighting.
    ///
    /// Refuses to run against a non-empty version table.
    #[arg(long)]
    pub full_refresh: bool,
}

/// Execute the dims command.
///
/// # Errors
///
/// Returns an error if the batch file cannot be read or the versioning
/// run fails.
pub async fn execute(args: DimsArgs, config: &Config) -> Result<()> {
    let batch = read_customer_batch(&args.batch)?;
    let store = DimensionStore::new(config.storage.clone());

    let summary = if args.full_refresh {
        store.run_full_refresh(batch).await
    } else {
        store.run_batch(batch).await
    }
    .context("versioning run failed")?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("Versioning run committed");
            println!("  Rows processed:  {}", summary.rows_processed);
            println!("  Bootstraps:      {}", summary.bootstraps);
            println!("  New versions:    {}", summary.new_versions);
            println!("  Pass-through:    {}", summary.passthrough_updates);
            if summary.rejected() > 0 {
                println!(
                    "  Rejected:        {} ({} invalid key, {} out of order)",
                    summary.rejected(),
                    summary.rejected_invalid_key,
                    summary.rejected_out_of_order
                );
            }
            println!(
                "  Table:           {} versions across {} customers",
                summary.table_rows, summary.customers
            );
        }
    }

    Ok(())
}
