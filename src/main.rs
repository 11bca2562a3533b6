use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use ringsim::client::{ClientSet, InMemoryLedger};
use ringsim::collector::{DataCollector, JsonlCollector, NullCollector};
use ringsim::config_loader::{self, CliOverrides};
use ringsim::orchestrator::Simulation;
use ringsim::registry::{ActionRegistryBuilder, RINGSHUB_CLIENT};

/// Agent-based simulation of a trust-based token network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the network configuration YAML file
    #[arg(short, long)]
    network_config: PathBuf,

    /// Path to the agent configuration YAML file
    #[arg(short, long)]
    agent_config: PathBuf,

    /// Override the number of agents
    #[arg(short, long)]
    size: Option<usize>,

    /// Override the number of requests per batch
    #[arg(long)]
    batch_size: Option<usize>,

    /// Override the number of iterations
    #[arg(short, long)]
    iterations: Option<u64>,

    /// Override the number of blocks mined per iteration
    #[arg(long)]
    blocks_per_iteration: Option<u64>,

    /// Override the block spacing (e.g. "5" or "12s")
    #[arg(long)]
    block_time: Option<String>,

    /// Override the random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Skip data collection
    #[arg(long)]
    fast: bool,

    /// JSON-lines file receiving run records
    #[arg(short, long, default_value = "ringsim_output/run.jsonl")]
    output: PathBuf,

    /// Directory of action manifests to register next to the built-in actions
    #[arg(long)]
    actions_dir: Option<PathBuf>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            network_size: self.size,
            batch_size: self.batch_size,
            iterations: self.iterations,
            blocks_per_iteration: self.blocks_per_iteration,
            block_time: self.block_time.clone(),
            seed: self.seed,
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(&args.log_level)).init();

    info!("Starting ringsim");
    info!("Network configuration: {:?}", args.network_config);
    info!("Agent configuration: {:?}", args.agent_config);

    let config = config_loader::load_config_with_overrides(&args.network_config, &args.agent_config, &args.overrides())?;

    let mut builder = ActionRegistryBuilder::new().with_builtin_actions();
    if let Some(dir) = &args.actions_dir {
        let added = builder
            .discover(dir)
            .wrap_err_with(|| format!("Failed to discover actions in '{}'", dir.display()))?;
        info!("Discovered {} actions in {:?}", added, dir);
    }
    let registry = builder.build();

    let ledger = InMemoryLedger::new(config.network.call_timeout);
    let clients = ClientSet::new().with_client(RINGSHUB_CLIENT, Box::new(ledger.clone()));

    let collector: Box<dyn DataCollector> = if args.fast {
        info!("Fast mode: data collection disabled");
        Box::new(NullCollector)
    } else {
        let collector = JsonlCollector::open(&args.output)
            .wrap_err_with(|| format!("Failed to open output file '{}'", args.output.display()))?;
        Box::new(collector)
    };

    let mut simulation = Simulation::new(config, registry, clients, Box::new(ledger), collector)?;
    let summary = simulation.run()?;

    if summary.completed() {
        info!("Simulation completed in {:.2}s", summary.duration_secs);
    } else {
        info!("Simulation stopped after {:.2}s", summary.duration_secs);
    }
    if !args.fast {
        info!("Run records written to {:?}", args.output);
    }
    Ok(())
}
