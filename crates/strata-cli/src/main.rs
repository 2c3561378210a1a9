//! Strata CLI - the warehouse batch runner.
//!
//! The main entry point for the `strata` CLI binary.

use anyhow::Result;
use clap::Parser;

use strata_cli::{Cli, Commands};
use strata_core::{init_logging, LogFormat};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    });

    let config = cli.config()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Init(args) => strata_cli::commands::init::execute(args, &config).await,
            Commands::Dims(args) => strata_cli::commands::dims::execute(args, &config).await,
            Commands::Ingest(args) => strata_cli::commands::ingest::execute(args, &config).await,
            Commands::Segment(args) => strata_cli::commands::segment::execute(args, &config).await,
            Commands::Status(args) => strata_cli::commands::status::execute(&args, &config).await,
        }
    })
}
