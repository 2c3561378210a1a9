//! Segment command - recompute and publish the segmentation relation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;

use strata_segment::{SegmentationConfig, SegmentationEngine};

use crate::{Config, OutputFormat};

/// Arguments for the segment command.
#[derive(Debug, Args)]
pub struct SegmentArgs {
    /// As-of anchor date for the rolling windows.
    #[arg(long)]
    pub as_of: NaiveDate,

    /// JSON threshold configuration; omitted fields keep production
    /// defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Execute the segment command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the run fails; a
/// failed run leaves the previously published snapshot in place.
pub async fn execute(args: SegmentArgs, config: &Config) -> Result<()> {
    let thresholds = match &args.config {
        Some(path) => {
            let data = std::fs::read(path)
                .with_context(|| format!("read segmentation config {}", path.display()))?;
            SegmentationConfig::from_json(&data)
                .with_context(|| format!("parse segmentation config {}", path.display()))?
        }
        None => SegmentationConfig::default(),
    };

    let engine = SegmentationEngine::new(config.storage.clone()).with_config(thresholds);
    let summary = engine
        .run(args.as_of)
        .await
        .context("segmentation run failed")?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("Segmentation run published");
            println!("  As of:     {}", summary.as_of);
            println!("  Facts:     {} scanned", summary.facts_scanned);
            println!("  Customers: {} scored", summary.customers_scored);
            if !summary.distribution.is_empty() {
                println!();
                println!("Segments:");
                for (label, count) in &summary.distribution {
                    println!("  {:<22} {count}", label.display_name());
                }
            }
            println!();
            println!("Snapshot: {}", summary.snapshot_path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_args_parsing() {
        use clap::Parser;

        #[derive(Parser)]
        struct TestCli {
            #[command(flatten)]
            args: SegmentArgs,
        }

        let cli = TestCli::parse_from(["test", "--as-of", "2024-07-01"]);
        assert_eq!(
            cli.args.as_of,
            NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
        );
        assert!(cli.args.config.is_none());
    }
}
