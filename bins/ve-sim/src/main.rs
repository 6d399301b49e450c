//! Vote-escrow protocol simulator.
//!
//! Replays a JSON scenario (locks, deposits, reward windows, votes, time
//! travel) against the in-memory protocol and prints the resulting state.

mod scenario;
mod sim;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::scenario::{load_config, load_scenario};
use crate::sim::Simulation;

#[derive(Parser, Debug)]
#[command(name = "ve-sim", version, about = "Vote-escrow ledger, gauge and voter simulator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a scenario file and print a JSON report of the final state
    Run(RunArgs),
    /// Validate a protocol config file
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Scenario file: `{ "config": {...}, "start": <unix secs>, "steps": [...] }`
    scenario: PathBuf,

    /// Pretty-print the report
    #[arg(long)]
    pretty: bool,
}

#[derive(Args, Debug)]
struct CheckConfigArgs {
    /// Config file: `{ "ledger": {...}, "gauge": {...} }`
    file: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Run(args) => {
            let scenario = load_scenario(&args.scenario)?;
            info!(path = %args.scenario.display(), steps = scenario.steps.len(), "running scenario");
            let report = Simulation::run(&scenario)?;
            let out = if args.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{out}");
        }
        Commands::CheckConfig(args) => {
            let config = load_config(&args.file)?;
            println!("{}: ok", args.file.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

/// Logs go to stderr; stdout carries the report.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}
