use crate::config::{AgentConfig, NetworkConfig, SimulationConfig};
use crate::utils::duration::parse_duration_to_seconds;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and validate both configuration files
pub fn load_config(network_path: &Path, agent_path: &Path) -> Result<SimulationConfig> {
    load_config_with_overrides(network_path, agent_path, &CliOverrides::default())
}

/// Load both configuration files, apply CLI overrides, then validate
pub fn load_config_with_overrides(
    network_path: &Path,
    agent_path: &Path,
    overrides: &CliOverrides,
) -> Result<SimulationConfig> {
    info!("Loading network configuration from: {:?}", network_path);
    let file = File::open(network_path)
        .wrap_err_with(|| format!("Failed to open network configuration '{}'", network_path.display()))?;
    let network: NetworkConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse network configuration '{}'", network_path.display()))?;

    info!("Loading agent configuration from: {:?}", agent_path);
    let file = File::open(agent_path)
        .wrap_err_with(|| format!("Failed to open agent configuration '{}'", agent_path.display()))?;
    let agents: AgentConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse agent configuration '{}'", agent_path.display()))?;

    let mut config = SimulationConfig { network, agents };
    apply_overrides(&mut config, overrides)?;

    config.validate()?;
    info!(
        "Configuration loaded: {} agents across {} profiles, {} iterations",
        config.network.network_size,
        config.agents.agent_distribution.len(),
        config.network.iterations
    );

    Ok(config)
}

/// CLI arguments that override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub network_size: Option<usize>,
    pub batch_size: Option<usize>,
    pub iterations: Option<u64>,
    pub blocks_per_iteration: Option<u64>,
    /// Seconds per block, as `5` or `"5s"`
    pub block_time: Option<String>,
    pub seed: Option<u64>,
}

/// Apply CLI overrides to a loaded configuration
pub fn apply_overrides(config: &mut SimulationConfig, overrides: &CliOverrides) -> Result<()> {
    let network = &mut config.network;

    if let Some(size) = overrides.network_size {
        info!("Overriding network size: {} -> {}", network.network_size, size);
        network.network_size = size;
    }
    if let Some(batch_size) = overrides.batch_size {
        info!("Overriding batch size: {} -> {}", network.batch_size, batch_size);
        network.batch_size = batch_size;
    }
    if let Some(iterations) = overrides.iterations {
        info!("Overriding iterations: {} -> {}", network.iterations, iterations);
        network.iterations = iterations;
    }
    if let Some(blocks) = overrides.blocks_per_iteration {
        info!("Overriding blocks per iteration: {} -> {}", network.blocks_per_iteration, blocks);
        network.blocks_per_iteration = blocks;
    }
    if let Some(block_time) = &overrides.block_time {
        let seconds = parse_duration_to_seconds(block_time)
            .map_err(|e| eyre!("Invalid block time override '{}': {}", block_time, e))?;
        info!("Overriding block time: {}s -> {}s", network.block_time, seconds);
        network.block_time = seconds;
    }
    if let Some(seed) = overrides.seed {
        info!("Overriding seed: {} -> {}", network.seed, seed);
        network.seed = seed;
    }

    Ok(())
}
