//! # strata-cli
//!
//! Command-line interface for the strata warehouse.
//!
//! ## Commands
//!
//! - `strata init` - Materialize the static calendar and category dimensions
//! - `strata dims` - Apply a customer batch to the version table
//! - `strata ingest` - Ingest a staged fact batch past the watermark
//! - `strata segment` - Recompute and publish the segmentation relation
//! - `strata status` - Summarize table row counts and the watermark
//!
//! Batches arrive as CSV files from the upstream staging layer. The
//! warehouse itself is a local data directory (`--data-dir` or
//! `STRATA_DATA_DIR`), one object per file, which is the same layout the
//! engines use against any other storage backend.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod input;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use strata_core::FsBackend;

/// Strata CLI - batch runner for the dimensional warehouse.
#[derive(Debug, Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Warehouse data directory.
    #[arg(long, env = "STRATA_DATA_DIR", default_value = ".strata")]
    pub data_dir: PathBuf,

    /// Output format.
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,

    /// Emit JSON logs (for scheduled jobs).
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Builds the effective configuration, opening the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created or opened.
    pub fn config(&self) -> Result<Config> {
        let storage = FsBackend::new(&self.data_dir)
            .with_context(|| format!("open data directory {}", self.data_dir.display()))?;
        Ok(Config {
            storage: Arc::new(storage),
            format: self.format,
        })
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Materialize the static calendar and category dimensions.
    Init(commands::init::InitArgs),
    /// Apply a customer batch to the version table.
    Dims(commands::dims::DimsArgs),
    /// Ingest a staged fact batch past the watermark.
    Ingest(commands::ingest::IngestArgs),
    /// Recompute and publish the segmentation relation.
    Segment(commands::segment::SegmentArgs),
    /// Summarize table row counts and the watermark.
    Status(commands::status::StatusArgs),
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output (one summary document per run).
    Json,
}

/// Effective CLI configuration.
pub struct Config {
    /// The opened warehouse backend.
    pub storage: Arc<FsBackend>,
    /// Output format.
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "strata",
            "--data-dir",
            "/tmp/warehouse",
            "--format",
            "json",
            "status",
        ]);

        assert_eq!(cli.data_dir, PathBuf::from("/tmp/warehouse"));
        assert!(matches!(cli.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Status(_)));
    }

    #[test]
    fn config_opens_data_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "strata",
            "--data-dir",
            dir.path().to_str().unwrap(),
            "status",
        ]);
        let config = cli.config().unwrap();
        assert!(matches!(config.format, OutputFormat::Text));
    }
}
