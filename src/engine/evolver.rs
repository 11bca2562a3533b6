//! Network evolution.
//!
//! One iteration is:
//!
//! 1. **advance time**: mine `blocks_per_iteration` blocks on the backend
//! 2. **plan**: visit agents in a seeded shuffle; for every action of the
//!    agent's profile check cooldown and eligibility, draw against the
//!    action's probability and resolve parameters
//! 3. **dispatch**: submit the planned requests in batches and reconcile
//!
//! ```text
//! Idle --advance_time--> TimeAdvanced --evolve_network--> Evolving --> Idle
//!   \--------------------(mining fails)-----------------------> Aborted
//! ```

use log::{debug, error, info};
use rand::seq::SliceRandom;
use rand::Rng;

use super::dispatch::Dispatcher;
use super::stats::IterationStatistics;
use super::{EngineError, IterationAborted, NetworkState, SimRng};
use crate::actions::ActionContext;
use crate::client::types::{ChainHead, OperationRequest};
use crate::client::ChainControl;
use crate::registry::ActionRegistry;

/// Lifecycle of the evolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolverPhase {
    Idle,
    TimeAdvanced,
    Evolving,
    Aborted,
}

/// Drives the per-iteration scheduling loop.
pub struct NetworkEvolver<'a> {
    registry: &'a ActionRegistry,
    dispatcher: &'a mut Dispatcher,
    chain: &'a mut dyn ChainControl,
    rng: &'a mut SimRng,
    phase: EvolverPhase,
    head: ChainHead,
}

impl<'a> NetworkEvolver<'a> {
    pub fn new(
        registry: &'a ActionRegistry,
        dispatcher: &'a mut Dispatcher,
        chain: &'a mut dyn ChainControl,
        rng: &'a mut SimRng,
    ) -> Self {
        let head = chain.head().unwrap_or_default();
        Self {
            registry,
            dispatcher,
            chain,
            rng,
            phase: EvolverPhase::Idle,
            head,
        }
    }

    pub fn phase(&self) -> EvolverPhase {
        self.phase
    }

    /// Chain head after the last time advancement
    pub fn head(&self) -> ChainHead {
        self.head
    }

    /// Mine `blocks` blocks spaced `seconds_per_block` apart.
    ///
    /// Returns `false` and moves to [`EvolverPhase::Aborted`] if the backend
    /// cannot advance time.
    pub fn advance_time(&mut self, blocks: u64, seconds_per_block: u64) -> bool {
        if self.phase == EvolverPhase::Aborted {
            return false;
        }
        match self.chain.mine(blocks, seconds_per_block) {
            Ok(head) => {
                debug!("Advanced to block {} (t={})", head.block, head.timestamp);
                self.head = head;
                self.phase = EvolverPhase::TimeAdvanced;
                true
            }
            Err(e) => {
                error!("Failed to advance time by {} blocks: {}", blocks, e);
                self.phase = EvolverPhase::Aborted;
                false
            }
        }
    }

    /// Run one iteration at the current chain head.
    pub fn evolve_network(
        &mut self,
        state: &mut NetworkState,
        iteration: u64,
    ) -> Result<IterationStatistics, IterationAborted> {
        let mut stats = IterationStatistics::new(iteration, self.head.block);
        if self.phase == EvolverPhase::Aborted {
            return Err(IterationAborted {
                iteration,
                partial: stats,
                source: EngineError::Aborted,
            });
        }
        self.phase = EvolverPhase::Evolving;

        let requests = self.plan(state);
        debug!("Iteration {}: {} actions selected", iteration, requests.len());

        let result = self.dispatcher.dispatch(state, &requests, self.head, &mut stats);
        self.phase = EvolverPhase::Idle;
        if let Err(source) = result {
            error!("Iteration {} stopped early: {}", iteration, source);
            self.dispatcher.record_iteration(&stats);
            return Err(IterationAborted {
                iteration,
                partial: stats,
                source,
            });
        }

        self.dispatcher.record_iteration(&stats);
        info!(
            "Iteration {} at block {}: {}/{} actions succeeded",
            iteration, stats.block, stats.successful_actions, stats.total_actions
        );
        Ok(stats)
    }

    /// Select and resolve this iteration's actions.
    fn plan(&mut self, state: &NetworkState) -> Vec<OperationRequest> {
        let registry = self.registry;
        let head = self.head;

        let mut order: Vec<usize> = (0..state.agents.len()).collect();
        order.shuffle(&mut *self.rng);

        let mut requests = Vec::new();
        for index in order {
            let Some(agent) = state.agents.get(index) else {
                continue;
            };
            let cap = agent.profile.max_actions_per_iteration.unwrap_or(usize::MAX);
            let mut selected = 0;

            for (action, config) in agent.profile.actions() {
                if selected >= cap {
                    break;
                }
                let Ok(descriptor) = registry.resolve(action) else {
                    debug!("Profile '{}' action '{}' is not registered", agent.profile.name, action);
                    continue;
                };
                if !agent.is_cooldown_elapsed(action, head.block) {
                    continue;
                }
                let ctx = ActionContext {
                    agent,
                    config,
                    tracker: &state.tracker,
                    head,
                };
                if !descriptor.is_eligible(&ctx) {
                    continue;
                }
                if self.rng.gen::<f64>() >= config.probability {
                    continue;
                }
                match descriptor.resolve(&ctx, &mut *self.rng) {
                    Some(request) => {
                        requests.push(request);
                        selected += 1;
                    }
                    None => debug!("No valid parameters for '{}' of agent '{}'", action, agent.id),
                }
            }
        }
        requests
    }

    /// Compare the snapshot with the backend.
    pub fn audit(&self, state: &NetworkState) -> Result<usize, EngineError> {
        self.dispatcher.audit(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActionConfig, Profile};
    use crate::client::{ClientSet, InMemoryLedger};
    use crate::collector::NullCollector;
    use crate::config::InitialAction;
    use crate::engine::NetworkBuilder;
    use rand::SeedableRng;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    struct Harness {
        ledger: InMemoryLedger,
        registry: ActionRegistry,
        dispatcher: Dispatcher,
        rng: SimRng,
        state: NetworkState,
    }

    /// `size` registered agents of `profile`
    fn harness(profile: Profile, size: usize) -> Harness {
        let ledger = InMemoryLedger::new(Duration::from_secs(30));
        let registry = ActionRegistry::builtin();
        let clients = ClientSet::new().with_client("ringshub", Box::new(ledger.clone()));
        let mut dispatcher = Dispatcher::new(clients, Box::new(NullCollector), 10);
        let mut rng = SimRng::seed_from_u64(7);
        let mut state = NetworkState::new();
        let profiles = BTreeMap::from([("honest".to_string(), Arc::new(profile))]);

        NetworkBuilder::new(&registry, &mut dispatcher, &ledger, &mut rng)
            .build(
                &mut state,
                size,
                &[("honest".to_string(), 1)],
                &profiles,
                &[InitialAction::new("ringshub_RegisterHuman")],
                &BTreeMap::new(),
            )
            .unwrap();
        Harness { ledger, registry, dispatcher, rng, state }
    }

    fn mint_profile(probability: f64, cooldown_blocks: u64) -> Profile {
        Profile::with_actions(
            "honest",
            vec![(
                "ringshub_PersonalMint".to_string(),
                ActionConfig { probability, cooldown_blocks, ..ActionConfig::default() },
            )],
        )
    }

    #[test]
    fn test_advance_time_moves_head() {
        let mut h = harness(mint_profile(1.0, 0), 2);
        let mut chain = h.ledger.clone();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        assert_eq!(evolver.phase(), EvolverPhase::Idle);
        assert!(evolver.advance_time(100, 5));
        assert_eq!(evolver.phase(), EvolverPhase::TimeAdvanced);
        assert_eq!(evolver.head().block, 100);

        evolver.evolve_network(&mut h.state, 1).unwrap();
        assert_eq!(evolver.phase(), EvolverPhase::Idle);
    }

    #[test]
    fn test_mining_failure_aborts() {
        let mut h = harness(mint_profile(1.0, 0), 2);
        let mut chain = h.ledger.clone();
        h.ledger.set_reachable(false).unwrap();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        assert!(!evolver.advance_time(100, 5));
        assert_eq!(evolver.phase(), EvolverPhase::Aborted);
        let aborted = evolver.evolve_network(&mut h.state, 1).unwrap_err();
        assert!(matches!(aborted.source, EngineError::Aborted));
        assert_eq!(aborted.partial.total_actions, 0);
    }

    #[test]
    fn test_every_eligible_agent_mints_at_probability_one() {
        let mut h = harness(mint_profile(1.0, 0), 4);
        let mut chain = h.ledger.clone();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        // 720 blocks of 5 seconds is one hour of issuance.
        assert!(evolver.advance_time(720, 5));
        let stats = evolver.evolve_network(&mut h.state, 1).unwrap();
        assert_eq!(stats.attempts_of("ringshub_PersonalMint"), 4);
        assert_eq!(stats.successes_of("ringshub_PersonalMint"), 4);
    }

    #[test]
    fn test_probability_zero_never_selects() {
        let mut h = harness(mint_profile(0.0, 0), 3);
        let mut chain = h.ledger.clone();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        for iteration in 1..=50 {
            assert!(evolver.advance_time(720, 5));
            let stats = evolver.evolve_network(&mut h.state, iteration).unwrap();
            assert_eq!(stats.total_actions, 0);
        }
    }

    #[test]
    fn test_cooldown_skips_until_elapsed() {
        let mut h = harness(mint_profile(1.0, 1_000), 1);
        let mut chain = h.ledger.clone();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        assert!(evolver.advance_time(720, 5));
        assert_eq!(evolver.evolve_network(&mut h.state, 1).unwrap().total_actions, 1);
        // Block 1440: only 720 blocks since the mint.
        assert!(evolver.advance_time(720, 5));
        assert_eq!(evolver.evolve_network(&mut h.state, 2).unwrap().total_actions, 0);
        // Block 2160: cooldown of 1000 blocks has elapsed.
        assert!(evolver.advance_time(720, 5));
        assert_eq!(evolver.evolve_network(&mut h.state, 3).unwrap().total_actions, 1);
    }

    #[test]
    fn test_max_actions_per_iteration_caps_agent() {
        let mut profile = Profile::with_actions(
            "honest",
            vec![
                ("ringshub_PersonalMint".to_string(), ActionConfig::default()),
                ("ringshub_RegisterGroup".to_string(), ActionConfig::default()),
            ],
        );
        profile.max_actions_per_iteration = Some(1);
        let mut h = harness(profile, 1);
        let mut chain = h.ledger.clone();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        assert!(evolver.advance_time(720, 5));
        let stats = evolver.evolve_network(&mut h.state, 1).unwrap();
        assert_eq!(stats.total_actions, 1);
        assert_eq!(stats.attempts_of("ringshub_PersonalMint"), 1);
    }

    #[test]
    fn test_rejected_call_is_counted_as_failure() {
        let mut h = harness(mint_profile(1.0, 0), 2);
        h.ledger.reject_method("personalMint").unwrap();
        let mut chain = h.ledger.clone();
        let mut evolver = NetworkEvolver::new(&h.registry, &mut h.dispatcher, &mut chain, &mut h.rng);

        assert!(evolver.advance_time(720, 5));
        let stats = evolver.evolve_network(&mut h.state, 1).unwrap();
        assert_eq!(stats.total_actions, 2);
        assert_eq!(stats.failed_actions(), 2);
        let agent = h.state.agents.agent("honest-0000").unwrap();
        assert_eq!(agent.last_executed("ringshub_PersonalMint"), None);
    }
}
