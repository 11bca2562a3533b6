//! Simulation orchestrator.
//!
//! This module owns one run end to end:
//!
//! 1. validate the configuration and resolve every profile against the
//!    action registry
//! 2. announce the run to the collector
//! 3. build the network
//! 4. advance time and evolve the network once per iteration
//! 5. close the run and aggregate a [`RunSummary`]
//!
//! A backend outage stops the run early; statistics gathered until then are
//! kept and the stop reason is reported in the summary.

use chrono::Utc;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{error, info, warn};
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use crate::agent::Profile;
use crate::client::{ChainControl, ClientSet};
use crate::collector::{DataCollector, RunParameters};
use crate::config::SimulationConfig;
use crate::engine::{
    ActionTally, BuildReport, Dispatcher, EngineError, IterationStatistics, NetworkBuilder, NetworkEvolver, NetworkState,
    RunSummary, SimRng,
};
use crate::registry::ActionRegistry;

struct EarlyStop {
    reason: String,
    /// The last entry of the history is an interrupted iteration.
    partial_iteration: bool,
}

impl EarlyStop {
    fn new(reason: String) -> Self {
        Self {
            reason,
            partial_iteration: false,
        }
    }
}

/// One configured simulation run.
pub struct Simulation {
    config: SimulationConfig,
    registry: ActionRegistry,
    profiles: BTreeMap<String, Arc<Profile>>,
    dispatcher: Dispatcher,
    chain: Box<dyn ChainControl>,
    rng: SimRng,
    state: NetworkState,
    build_report: Option<BuildReport>,
    history: Vec<IterationStatistics>,
    started: bool,
}

impl Simulation {
    /// Prepare a run.
    ///
    /// # Arguments
    ///
    /// * `config` - Network and agent configuration
    /// * `registry` - Actions available to profiles
    /// * `clients` - Execution clients by name
    /// * `chain` - Backend used to advance time
    /// * `collector` - Sink for outcomes and statistics
    ///
    /// # Returns
    ///
    /// * An error if the configuration is invalid, references actions the
    ///   registry does not know, or uses an action whose client is missing
    ///   from `clients`
    pub fn new(
        config: SimulationConfig,
        registry: ActionRegistry,
        clients: ClientSet,
        chain: Box<dyn ChainControl>,
        collector: Box<dyn DataCollector>,
    ) -> Result<Self> {
        config.validate().wrap_err("Configuration validation failed")?;

        let mut profiles = BTreeMap::new();
        for (name, profile_config) in &config.agents.profiles {
            let profile = Profile::from_config(name, profile_config)
                .wrap_err_with(|| format!("Failed to load profile '{}'", name))?;
            profiles.insert(name.clone(), Arc::new(profile));
        }
        registry
            .validate_profiles(profiles.values().map(|profile| profile.as_ref()))
            .wrap_err("Profiles reference unregistered actions")?;
        let client_names: BTreeSet<&str> = clients.names().collect();
        let profile_actions = profiles.values().flat_map(|profile| profile.action_names());
        let initial_actions = config.network.initial_actions.iter().map(|initial| initial.action.as_str());
        for action in profile_actions.chain(initial_actions) {
            let descriptor = registry
                .resolve(action)
                .wrap_err_with(|| format!("Action '{}' cannot run", action))?;
            if !client_names.contains(descriptor.client.as_str()) {
                return Err(eyre!(
                    "Action '{}' targets client '{}', which is not configured (available: {:?})",
                    action,
                    descriptor.client,
                    client_names
                ));
            }
        }

        info!(
            "Loaded {} profiles and {} registered actions",
            profiles.len(),
            registry.len()
        );

        let rng = SimRng::seed_from_u64(config.network.seed);
        let dispatcher = Dispatcher::new(clients, collector, config.network.batch_size);

        Ok(Self {
            config,
            registry,
            profiles,
            dispatcher,
            chain,
            rng,
            state: NetworkState::new(),
            build_report: None,
            history: Vec::new(),
            started: false,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Agents and tracked ledger state
    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Statistics of every evolved iteration, including a partial one
    /// that ended the run.
    pub fn history(&self) -> &[IterationStatistics] {
        &self.history
    }

    pub fn build_report(&self) -> Option<&BuildReport> {
        self.build_report.as_ref()
    }

    fn run_parameters(&self) -> RunParameters {
        let network = &self.config.network;
        RunParameters {
            start_time: Utc::now(),
            network_size: network.network_size,
            batch_size: network.batch_size,
            iterations: network.iterations,
            blocks_per_iteration: network.blocks_per_iteration,
            block_time: network.block_time,
            seed: network.seed,
            profiles: self.config.agents.agent_distribution.iter().map(|(name, _)| name.clone()).collect(),
            actions: self.registry.names().map(str::to_string).collect(),
        }
    }

    /// Execute the run.
    ///
    /// The collector's run is closed even when the run stops early.
    pub fn run(&mut self) -> Result<RunSummary> {
        if self.started {
            return Err(eyre!("Simulation has already been run"));
        }
        self.started = true;
        let started = Instant::now();
        let description = self
            .config
            .network
            .description
            .clone()
            .unwrap_or_else(|| format!("ringsim run with {} agents", self.config.network.network_size));
        let parameters = self.run_parameters();
        self.dispatcher.start_run(&parameters, &description);

        let outcome = self.build_and_evolve();
        self.dispatcher.end_run();
        let stop = outcome?;

        let mut summary = RunSummary::from_iterations(self.config.network.network_size, &self.history);
        if let Some(report) = &self.build_report {
            summary.build = ActionTally {
                attempted: report.attempted,
                succeeded: report.succeeded,
            };
            summary.final_block = summary.final_block.max(report.stats.block);
        }
        if let Some(stop) = stop {
            if stop.partial_iteration {
                summary.iterations_completed -= 1;
            }
            summary.stopped_early = Some(stop.reason);
        }
        summary.duration_secs = started.elapsed().as_secs_f64();

        info!("=== Simulation Summary ===");
        info!("Agents: {}", self.state.agents.len());
        info!("Iterations completed: {}/{}", summary.iterations_completed, self.config.network.iterations);
        info!("Initial actions: {}/{} succeeded", summary.build.succeeded, summary.build.attempted);
        info!("Actions: {}/{} succeeded", summary.successful_actions, summary.total_actions);
        for (action, tally) in &summary.action_counts {
            info!("  {}: {}/{} succeeded", action, tally.succeeded, tally.attempted);
        }
        info!("Final block: {}", summary.final_block);
        if let Some(reason) = &summary.stopped_early {
            warn!("Run stopped early: {}", reason);
        }
        Ok(summary)
    }

    /// Build the network, then evolve it.
    ///
    /// Returns why the run stopped early, if it did.
    fn build_and_evolve(&mut self) -> Result<Option<EarlyStop>> {
        let network = &self.config.network;

        let built = NetworkBuilder::new(&self.registry, &mut self.dispatcher, self.chain.as_ref(), &mut self.rng).build(
            &mut self.state,
            network.network_size,
            &self.config.agents.agent_distribution,
            &self.profiles,
            &network.initial_actions,
            &network.initial_state,
        );
        match built {
            Ok(report) => self.build_report = Some(report),
            Err(aborted) => {
                self.build_report = aborted.partial;
                match aborted.source {
                    EngineError::BackendUnavailable(reason) => {
                        error!("Network build stopped: backend unavailable");
                        return Ok(Some(EarlyStop::new(format!("backend unavailable during build: {}", reason))));
                    }
                    e => return Err(e).wrap_err("Failed to build network"),
                }
            }
        }

        let mut evolver = NetworkEvolver::new(&self.registry, &mut self.dispatcher, self.chain.as_mut(), &mut self.rng);
        for iteration in 1..=network.iterations {
            if !evolver.advance_time(network.blocks_per_iteration, network.block_time) {
                return Ok(Some(EarlyStop::new(format!("failed to advance time before iteration {}", iteration))));
            }

            match evolver.evolve_network(&mut self.state, iteration) {
                Ok(stats) => self.history.push(stats),
                Err(aborted) => {
                    let reason = aborted.to_string();
                    self.history.push(aborted.partial);
                    return Ok(Some(EarlyStop {
                        reason,
                        partial_iteration: true,
                    }));
                }
            }

            if let Some(every) = network.audit_every.filter(|every| *every > 0) {
                if iteration % every == 0 {
                    match evolver.audit(&self.state) {
                        Ok(0) => {}
                        Ok(divergent) => warn!("Audit after iteration {}: {} divergent balances", iteration, divergent),
                        Err(e) => {
                            return Ok(Some(EarlyStop::new(format!("audit after iteration {} failed: {}", iteration, e))))
                        }
                    }
                }
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("profiles", &self.profiles.keys().collect::<Vec<_>>())
            .field("dispatcher", &self.dispatcher)
            .field("agents", &self.state.agents.len())
            .field("iterations", &self.history.len())
            .finish()
    }
}
