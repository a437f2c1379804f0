#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the broadcast schedule harvester.
//!
//! `tv_schedule harvest <source>` renders a source's schedule pages in
//! headless Chrome, extracts one row per program and replaces the
//! per-channel tables in a CSV directory or a Google spreadsheet. Without a
//! subcommand the tool asks what to harvest.
//!
//! Uses `indicatif-log-bridge` (via [`tv_schedule_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod pipeline;

use clap::{Parser, Subcommand};

use crate::pipeline::HarvestArgs;

#[derive(Parser)]
#[command(name = "tv_schedule", about = "Broadcast schedule harvester")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in schedule sources
    Sources,
    /// Harvest one source and replace its channel tables
    Harvest(HarvestArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = tv_schedule_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        None => pipeline::interactive(&multi).await?,
        Some(Commands::Sources) => {
            let sources = tv_schedule_source::registry::all_sources()?;
            println!("{:<12} {:<18} {:<16} NAME", "ID", "FETCHER", "ATTRIBUTION");
            println!("{}", "-".repeat(64));
            for source in &sources {
                println!(
                    "{:<12} {:<18} {:<16} {}",
                    source.id,
                    source.fetcher.kind().as_ref(),
                    source.attribution.kind().as_ref(),
                    source.name
                );
            }
        }
        Some(Commands::Harvest(args)) => pipeline::run(&multi, args).await?,
    }

    Ok(())
}
