#![warn(clippy::pedantic)]

use fuelsim::{
    scenario::Scenario,
    sim::Simulation,
    station::Timing
};

use anyhow::{ensure, Context};
use clap::{Args, Parser, Subcommand};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{error, info};
use tracing_subscriber::{fmt::time, EnvFilter};

use std::{
    io,
    path::PathBuf,
    time::Duration
};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    #[arg(long, global = true, default_value = "info")]
    /// Log filter, used unless `RUST_LOG` is set
    log: String
}

#[derive(Subcommand)]
enum Command {
    /// Run a scenario and print its statistics
    Run {
        #[command(flatten)]
        scenario: ScenarioArgs,
        #[arg(short = 't', long, default_value_t = 1000)]
        /// Length of one simulated second, in milliseconds
        tick_ms: u64,
        #[arg(long, default_value_t = 1)]
        /// Seconds between getting a pump and asking for fuel
        approach: u32,
        #[arg(long, default_value_t = 2)]
        /// Seconds vehicles spend at the station before tankers start
        head_start: u32,
        #[arg(long, default_value_t = 2)]
        /// Seconds a tanker spends on each delivery
        unload: u32
    },
    /// Validate a scenario file and print the vehicles it resolves to
    Check {
        #[command(flatten)]
        scenario: ScenarioArgs
    }
}

#[derive(Args)]
struct ScenarioArgs {
    /// Scenario file (JSON)
    path: PathBuf,
    #[arg(short = 's', long)]
    /// Seed for the random arrival order
    seed: Option<u64>
}

impl ScenarioArgs {
    fn load(&self) -> anyhow::Result<Scenario> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy()
        };

        Scenario::load(&self.path, &mut rng)
            .with_context(|| format!("invalid scenario {}", self.path.display()))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
                 .or_else(|_| EnvFilter::try_new(&cli.log))
                 .context("invalid log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .with_timer(time::uptime())
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Check { scenario } => {
            println!("{}", scenario.load()?);
        },

        Command::Run { scenario, tick_ms, approach, head_start, unload } => {
            let timing = Timing {
                tick: Duration::from_millis(tick_ms),
                approach, head_start, unload
            };

            let scenario = scenario.load()?;
            info!(vehicles = scenario.vehicles.len(), "scenario loaded");

            let report = Simulation::new(scenario, timing).run()?;

            println!("{report}");

            if !report.conserved() {
                error!(levels = ?report.levels, consumed = report.consumed(), "fuel accounting does not add up");
            }

            if !report.within_capacity() {
                error!(pumps = report.pumps.capacity, "pumps were busier than possible");
            }

            ensure!(
                report.pumps.available == report.pumps.capacity,
                "{} pump(s) were never given back",
                report.pumps.capacity - report.pumps.available
            );
        }
    }

    Ok(())
}
