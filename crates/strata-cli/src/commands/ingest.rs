//! Ingest command - load a staged fact batch past the watermark.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;

use strata_ingest::{IngestionEngine, LinkMode, WatermarkStart, WatermarkStore};

use crate::input::read_fact_batch;
use crate::{Config, OutputFormat};

/// Which customer version facts link to.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum LinkModeArg {
    /// Link to the version currently flagged current.
    CurrentState,
    /// Link to the version in effect at the fact's event date.
    PointInTime,
}

impl From<LinkModeArg> for LinkMode {
    fn from(arg: LinkModeArg) -> Self {
        match arg {
            LinkModeArg::CurrentState => Self::CurrentState,
            LinkModeArg::PointInTime => Self::PointInTime,
        }
    }
}

/// Arguments for the ingest command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// CSV batch of staged fact records.
    #[arg(long)]
    pub source: PathBuf,

    /// Foreign-key link mode.
    #[arg(long, value_enum, default_value = "point-in-time")]
    pub mode: LinkModeArg,

    /// First load only: ingest everything the source has.
    #[arg(long, conflicts_with = "start_at")]
    pub from_beginning: bool,

    /// First load only: ingest records strictly after this timestamp.
    #[arg(long)]
    pub start_at: Option<DateTime<Utc>>,
}

/// Execute the ingest command.
///
/// When the destination already has a watermark, it wins and the start
/// flags are ignored. An empty destination requires an explicit
/// `--from-beginning` or `--start-at`; the command refuses to guess.
///
/// # Errors
///
/// Returns an error if the batch cannot be read, the start is ambiguous,
/// or the ingestion run fails (rejection threshold, watermark regression,
/// lost commit).
pub async fn execute(args: IngestArgs, config: &Config) -> Result<()> {
    let source = read_fact_batch(&args.source)?;

    let start = match (args.from_beginning, args.start_at) {
        (true, _) => WatermarkStart::Beginning,
        (false, Some(ts)) => WatermarkStart::At(ts),
        (false, None) => {
            let watermarks = WatermarkStore::new(config.storage.clone());
            if watermarks.load().await?.is_none() {
                bail!(
                    "destination has no watermark; pass --from-beginning to ingest \
                     everything or --start-at to begin at an explicit timestamp"
                );
            }
            // Never consulted: the stored watermark takes precedence.
            WatermarkStart::Beginning
        }
    };

    let engine = IngestionEngine::new(config.storage.clone());
    let summary = engine
        .run(source, args.mode.into(), start)
        .await
        .context("ingestion run failed")?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("Ingestion run committed");
            println!("  Selected:   {}", summary.selected);
            println!("  Appended:   {}", summary.appended);
            if summary.rejected_total() > 0 {
                println!(
                    "  Rejected:   {} ({:.1}% of selected)",
                    summary.rejected_total(),
                    summary.rejection_rate * 100.0
                );
                for (reason, count) in &summary.rejected {
                    println!("    {:<22} {count}", reason.as_str());
                }
            }
            println!("  Partitions: {}", summary.partitions_written);
            match summary.watermark {
                Some(watermark) => println!("  Watermark:  {watermark}"),
                None => println!("  Watermark:  (unset)"),
            }
            if summary.warning {
                println!();
                println!("Warning: some records were excluded; see the rejection tally");
            }
        }
    }

    Ok(())
}
