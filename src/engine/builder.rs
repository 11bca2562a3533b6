//! Network bootstrap.
//!
//! The builder allocates the population across profiles, creates every
//! agent with its accounts, and then runs the ordered initial actions once
//! per matching agent. Initial actions go through the same eligibility,
//! resolution and dispatch pipeline as the evolver but skip cooldown and
//! probability gating.

use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::dispatch::Dispatcher;
use super::stats::IterationStatistics;
use super::{BuildAborted, EngineError, NetworkState, SimRng};
use crate::actions::ActionContext;
use crate::agent::{allocate_agents, ActionConfig, Profile};
use crate::client::types::{ChainHead, OperationRequest};
use crate::client::ChainControl;
use crate::config::InitialAction;
use crate::registry::ActionRegistry;

/// What a build produced. Partial when carried by [`BuildAborted`].
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub agents_created: usize,
    /// Agents per profile, in distribution order
    pub per_profile: Vec<(String, usize)>,
    pub attempted: u64,
    pub succeeded: u64,
    pub stats: IterationStatistics,
}

impl BuildReport {
    fn new(agents_created: usize, per_profile: Vec<(String, usize)>, stats: IterationStatistics) -> Self {
        Self {
            agents_created,
            per_profile,
            attempted: stats.total_actions,
            succeeded: stats.successful_actions,
            stats,
        }
    }
}

/// Bootstraps a population and its seed relationships.
pub struct NetworkBuilder<'a> {
    registry: &'a ActionRegistry,
    dispatcher: &'a mut Dispatcher,
    chain: &'a dyn ChainControl,
    rng: &'a mut SimRng,
}

impl<'a> NetworkBuilder<'a> {
    pub fn new(
        registry: &'a ActionRegistry,
        dispatcher: &'a mut Dispatcher,
        chain: &'a dyn ChainControl,
        rng: &'a mut SimRng,
    ) -> Self {
        Self {
            registry,
            dispatcher,
            chain,
            rng,
        }
    }

    /// Build the network.
    ///
    /// # Arguments
    ///
    /// * `state` - Network state to populate
    /// * `target_size` - Number of agents to create
    /// * `distribution` - Profile weights in configuration order
    /// * `profiles` - Profiles by name
    /// * `initial_actions` - Bootstrap actions, run in order
    /// * `initial_state` - Attributes stamped on every agent
    ///
    /// # Returns
    ///
    /// * A [`BuildReport`] once every initial action has been attempted
    /// * [`BuildAborted`] if allocation fails or an initial action cannot
    ///   complete; once dispatch has started it carries the partial report
    ///   and outcomes confirmed before that point are kept
    pub fn build(
        &mut self,
        state: &mut NetworkState,
        target_size: usize,
        distribution: &[(String, u32)],
        profiles: &BTreeMap<String, Arc<Profile>>,
        initial_actions: &[InitialAction],
        initial_state: &BTreeMap<String, String>,
    ) -> Result<BuildReport, BuildAborted> {
        info!("Building network of {} agents", target_size);

        let allocation = allocate_agents(target_size, distribution).map_err(EngineError::from)?;
        let created = state
            .agents
            .create_agents(&allocation, profiles, initial_state, &mut *self.rng)
            .map_err(EngineError::from)?;
        if created != target_size {
            return Err(EngineError::PopulationMismatch {
                expected: target_size,
                created,
            }
            .into());
        }

        let head = self
            .chain
            .head()
            .map_err(|e| EngineError::BackendUnavailable(e.to_string()))?;
        let mut stats = IterationStatistics::new(0, head.block);

        for initial in initial_actions {
            if let Err(e) = self.run_initial_action(state, initial, head, &mut stats) {
                error!(
                    "Network build stopped at '{}' after {}/{} confirmed initial actions",
                    initial.action, stats.successful_actions, stats.total_actions
                );
                self.dispatcher.record_iteration(&stats);
                return Err(BuildAborted {
                    partial: Some(BuildReport::new(created, allocation, stats)),
                    source: e,
                });
            }
        }
        self.dispatcher.record_iteration(&stats);

        info!(
            "Network built: {} agents, {} humans, {} active trust edges ({}/{} initial actions confirmed)",
            state.agents.len(),
            state.tracker.human_count(),
            state.tracker.active_trust_edges(head.timestamp),
            stats.successful_actions,
            stats.total_actions
        );

        Ok(BuildReport::new(created, allocation, stats))
    }

    fn run_initial_action(
        &mut self,
        state: &mut NetworkState,
        initial: &InitialAction,
        head: ChainHead,
        stats: &mut IterationStatistics,
    ) -> Result<(), EngineError> {
        let requests = self.plan_initial_action(state, initial, head)?;
        info!(
            "Initial action '{}': submitting {} requests",
            initial.action,
            requests.len()
        );
        let before = stats.successful_actions;
        self.dispatcher.dispatch(state, &requests, head, stats)?;
        let confirmed = stats.successful_actions - before;
        if confirmed < requests.len() as u64 {
            warn!(
                "Initial action '{}': {} of {} requests failed",
                initial.action,
                requests.len() as u64 - confirmed,
                requests.len()
            );
        }
        Ok(())
    }

    /// Resolve one initial action for every matching agent.
    ///
    /// Agents whose profile does not list the action use the default
    /// action configuration.
    fn plan_initial_action(
        &mut self,
        state: &NetworkState,
        initial: &InitialAction,
        head: ChainHead,
    ) -> Result<Vec<OperationRequest>, EngineError> {
        let descriptor = self.registry.resolve(&initial.action)?;
        let fallback = ActionConfig::default();

        let matching = state
            .agents
            .iter()
            .filter(|agent| initial.profile.as_deref().map_or(true, |profile| agent.profile.name == profile))
            .take(initial.count.unwrap_or(usize::MAX));

        let mut requests = Vec::new();
        for agent in matching {
            let config = agent.profile.action_config(&initial.action).unwrap_or(&fallback);
            let ctx = ActionContext {
                agent,
                config,
                tracker: &state.tracker,
                head,
            };
            if !descriptor.is_eligible(&ctx) {
                debug!("Agent '{}' not eligible for initial '{}'", agent.id, initial.action);
                continue;
            }
            match descriptor.resolve(&ctx, &mut *self.rng) {
                Some(request) => requests.push(request),
                None => debug!("No parameters for initial '{}' of agent '{}'", initial.action, agent.id),
            }
        }
        Ok(requests)
    }
}
