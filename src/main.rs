//! Two-node aerial FSO/THz link simulator.
//!
//! Runs one experiment sweep (up to three beam-alignment intervals) over a
//! scenario and prints the capacity series as JSON for an external plotter.
//!
//! Usage:
//!   flytera-link-simulator --figure 4
//!   flytera-link-simulator --config scenario.toml --traces traces.json --pretty

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;

mod common;
mod simulation;

use common::scenario::{Scenario, validate_scenario};
use common::trace::TraceSet;
use simulation::experiment::run_experiment;

#[derive(Parser, Debug)]
#[command(name = "flytera-link-simulator", about = "Simulate beam alignment on a drone-to-drone optical link")]
struct Args {
    /// Scenario TOML file (built-in reference scenario if omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON trace file, overrides the scenario's trace_file
    #[arg(short, long)]
    traces: Option<PathBuf>,

    /// Figure preset to apply
    #[arg(short, long)]
    figure: Option<String>,

    /// Number of ticks to simulate, overrides the scenario
    #[arg(long)]
    horizon: Option<u64>,

    /// Debug logging for the simulator
    #[arg(short, long)]
    verbose: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logging setup
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("flytera_link_simulator"), level)
        .init();

    info!("Starting up");

    let mut scenario = match &args.config {
        Some(path) => Scenario::load(path).with_context(|| format!("Failed to load scenario {}", path.display()))?,
        None => {
            info!("No scenario file given, using the built-in reference scenario");
            Scenario::default()
        }
    };

    if let Some(figure) = &args.figure {
        scenario = scenario.with_figure(figure).context("Failed to apply figure preset")?;
    }
    if let Some(horizon) = args.horizon {
        scenario.network.horizon = horizon;
    }
    validate_scenario(&scenario)
        .map_err(anyhow::Error::msg)
        .context("Invalid scenario")?;

    let feed = TraceSet::for_scenario(&scenario, args.traces.as_deref()).context("Failed to prepare motion traces")?;
    let series = run_experiment(&scenario, &feed).context("Simulation aborted")?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&series)
    } else {
        serde_json::to_string(&series)
    }
    .context("Failed to serialize experiment series")?;
    println!("{}", output);

    for summary in &series.summaries {
        let values = series.series(summary.variant);
        let last = values.last().copied().unwrap_or_default();
        info!("Series {}: {} samples, final capacity {:.4}", summary.variant.label(), values.len(), last);
    }
    info!("Done: {} series of {} samples", series.summaries.len(), series.sim_time.len());
    Ok(())
}
