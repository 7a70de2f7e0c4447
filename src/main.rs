use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use traffic_microsim::{scenario, Parameters, Simulation};

/// Runs the default map without a window and prints the statistics.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Number of steps to run.
    #[arg(long, default_value_t = 1000)]
    steps: u64,
    /// Simulated length of a step in s.
    #[arg(long, default_value_t = 0.05)]
    dt: f64,
    /// Seed for the random number generator.
    #[arg(long)]
    seed: Option<u64>,
    /// Vehicle set to produce vehicles from.
    #[arg(long)]
    vehicle_set: Option<String>,
    /// JSON file with the parameters to use.
    #[arg(long)]
    parameters: Option<PathBuf>,
    /// Saved simulation to continue instead of starting on the default map.
    #[arg(long)]
    load: Option<PathBuf>,
    /// Where to save the simulation afterwards.
    #[arg(long)]
    save: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut parameters: Parameters = match &args.parameters {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading parameters from {}", path.display()))?;
            serde_json::from_str(&json).context("parsing parameters")?
        }
        None => Parameters::default(),
    };
    if let Some(name) = &args.vehicle_set {
        parameters.vehicle_set = name.clone();
    }

    let mut sim = match &args.load {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading simulation from {}", path.display()))?;
            let mut sim = Simulation::from_json(&json).context("restoring simulation")?;
            sim.apply_parameters(parameters);
            sim
        }
        None => {
            let network = scenario::default_map().context("building the default map")?;
            Simulation::new(network, parameters, args.seed)
        }
    };

    info!("simulating {} steps of {} s", args.steps, args.dt);
    let start = Instant::now();
    for _ in 0..args.steps {
        if sim.step(args.dt).terminated {
            info!("termination condition reached");
            break;
        }
    }
    let elapsed = start.elapsed();

    let stats = sim.statistics();
    info!(
        "{} steps in {:?} ({:.0} steps/s)",
        stats.step_count,
        elapsed,
        stats.step_count as f64 / elapsed.as_secs_f64().max(1e-9)
    );
    info!(
        "{} vehicles in the network, {} produced, {} reached their destination, {} missed it",
        stats.vehicle_count, stats.total_vehicle_count, stats.destination_reached, stats.destination_missed
    );
    info!(
        "mean speed {:.1} km/h, moving {:.1}% (mean {:.1}%), {:.0} m driven in {:.1} s",
        stats.mean_speed,
        100.0 * stats.moving_fraction,
        100.0 * stats.mean_moving_fraction,
        stats.total_distance,
        stats.time
    );

    if let Some(path) = &args.save {
        std::fs::write(path, sim.to_json()?).with_context(|| format!("saving to {}", path.display()))?;
        info!("saved to {}", path.display());
    }
    Ok(())
}
