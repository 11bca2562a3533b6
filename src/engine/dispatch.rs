//! Batch submission and reconciliation.
//!
//! Requests are cut into batches of `batch_size` and submitted one batch at
//! a time. After a batch returns, its outcomes are reconciled in request
//! order:
//!
//! 1. statistics are updated for every outcome
//! 2. confirmed outcomes are applied to the tracker, the agent's cooldown
//!    clock and counters, and any account the call created
//! 3. every outcome is handed to the collector
//!
//! A run-stopping error from any request stops submission after the current
//! batch has been reconciled, so the snapshot never holds half a batch.

use log::{debug, error, info, warn};

use super::stats::IterationStatistics;
use super::{EngineError, NetworkState};
use crate::client::types::{ChainHead, OperationRequest, Outcome, Query, ViewValue};
use crate::client::{ClientError, ClientSet};
use crate::collector::{DataCollector, RunId, RunParameters};

/// Shared submit pipeline of the builder and evolver.
pub struct Dispatcher {
    clients: ClientSet,
    collector: Box<dyn DataCollector>,
    batch_size: usize,
    run_id: Option<RunId>,
}

impl Dispatcher {
    pub fn new(clients: ClientSet, collector: Box<dyn DataCollector>, batch_size: usize) -> Self {
        Self {
            clients,
            collector,
            batch_size: batch_size.max(1),
            run_id: None,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.run_id
    }

    /// Announce a run to the collector.
    pub fn start_run(&mut self, parameters: &RunParameters, description: &str) -> Option<RunId> {
        match self.collector.start_run(parameters, description) {
            Ok(run_id) => {
                info!("Started run {}", run_id);
                self.run_id = Some(run_id);
            }
            Err(e) => warn!("Collector failed to start run: {}", e),
        }
        self.run_id
    }

    pub fn end_run(&mut self) {
        if let Err(e) = self.collector.end_run() {
            warn!("Collector failed to end run: {}", e);
        }
        self.run_id = None;
    }

    pub fn record_iteration(&mut self, stats: &IterationStatistics) {
        let run_id = self.run_id.unwrap_or_default();
        if let Err(e) = self.collector.record_iteration_stats(run_id, stats.iteration, stats) {
            warn!("Collector failed to record iteration {}: {}", stats.iteration, e);
        }
    }

    /// Submit `requests` in batches and reconcile every outcome.
    ///
    /// Returns [`EngineError::BackendUnavailable`] once a batch reports the
    /// backend as unavailable; later batches are not submitted.
    pub fn dispatch(
        &mut self,
        state: &mut NetworkState,
        requests: &[OperationRequest],
        head: ChainHead,
        stats: &mut IterationStatistics,
    ) -> Result<(), EngineError> {
        for (index, batch) in requests.chunks(self.batch_size).enumerate() {
            debug!("Submitting batch {} ({} requests)", index + 1, batch.len());
            let results = self.clients.submit(batch);

            let mut unavailable: Option<ClientError> = None;
            for (request, result) in batch.iter().zip(results) {
                let outcome = match result {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        debug!("{} for agent '{}' failed: {}", request.action, request.agent, e);
                        if e.is_run_stopping() && unavailable.is_none() {
                            unavailable = Some(e.clone());
                        }
                        Outcome::failed(request, e.to_string(), head)
                    }
                };
                self.reconcile(state, request, &outcome, head, stats);
            }

            if let Some(e) = unavailable {
                error!("Backend unavailable during batch {}: {}", index + 1, e);
                return Err(EngineError::BackendUnavailable(e.to_string()));
            }
        }
        Ok(())
    }

    fn reconcile(
        &mut self,
        state: &mut NetworkState,
        request: &OperationRequest,
        outcome: &Outcome,
        head: ChainHead,
        stats: &mut IterationStatistics,
    ) {
        stats.record(&request.action, outcome.success);

        if outcome.success {
            state.tracker.apply(outcome);
            match state.agents.agent_mut(&request.agent) {
                Some(agent) => agent.record_success(&request.action, head.block),
                None => warn!("Outcome for unknown agent '{}'", request.agent),
            }
            if let Some(account) = &request.new_account {
                state.agents.adopt_account(&request.agent, account.clone());
            }
        }

        if let Err(e) = self.collector.record_events(outcome) {
            warn!("Collector failed to record {} outcome: {}", outcome.method, e);
        }
    }

    /// Compare tracked holdings with the backend's balances.
    ///
    /// Every client answering `BalanceOf` is asked about every tracked
    /// holding of every agent account. Mismatches are logged.
    ///
    /// # Returns
    ///
    /// * The number of mismatching balances
    pub fn audit(&self, state: &NetworkState) -> Result<usize, EngineError> {
        let mut divergences = 0;
        let mut checked = 0;
        for name in self.clients.names() {
            let Some(client) = self.clients.get(name) else {
                continue;
            };
            'accounts: for agent in state.agents.iter() {
                for account in agent.accounts() {
                    for (token, tracked) in state.tracker.holdings(account) {
                        let query = Query::BalanceOf { account: account.clone(), token: token.clone() };
                        match client.view(&query) {
                            Ok(ViewValue::Amount(actual)) => {
                                checked += 1;
                                if actual != tracked {
                                    divergences += 1;
                                    warn!(
                                        "Balance divergence for {} token {} on '{}': tracked {}, backend {}",
                                        account, token, name, tracked, actual
                                    );
                                }
                            }
                            Ok(other) => debug!("Unexpected balance answer from '{}': {:?}", name, other),
                            Err(ClientError::Unsupported(_)) => break 'accounts,
                            Err(e) if e.is_run_stopping() => {
                                return Err(EngineError::BackendUnavailable(e.to_string()));
                            }
                            Err(e) => warn!("Balance query on '{}' failed: {}", name, e),
                        }
                    }
                }
            }
        }
        info!("Audit checked {} balances, {} divergent", checked, divergences);
        Ok(divergences)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("clients", &self.clients)
            .field("batch_size", &self.batch_size)
            .field("run_id", &self.run_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Profile;
    use crate::client::types::{Address, Call};
    use crate::client::{ExecutionClient, InMemoryLedger};
    use crate::collector::MemoryCollector;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    fn state_with_agents(count: usize) -> NetworkState {
        let mut state = NetworkState::new();
        let profiles = BTreeMap::from([("honest".to_string(), Arc::new(Profile::with_actions("honest", Vec::new())))]);
        let mut rng = <crate::engine::SimRng as rand::SeedableRng>::seed_from_u64(1);
        state
            .agents
            .create_agents(&[("honest".to_string(), count)], &profiles, &BTreeMap::new(), &mut rng)
            .unwrap();
        state
    }

    fn register_requests(state: &NetworkState) -> Vec<OperationRequest> {
        state
            .agents
            .iter()
            .map(|agent| OperationRequest {
                client: "ringshub".to_string(),
                action: "ringshub_RegisterHuman".to_string(),
                agent: agent.id.clone(),
                sender: agent.primary().unwrap().clone(),
                call: Call::RegisterHuman { inviter: None },
                gas_limit: 500_000,
                new_account: None,
            })
            .collect()
    }

    fn dispatcher(ledger: &InMemoryLedger, collector: &MemoryCollector, batch_size: usize) -> Dispatcher {
        let clients = ClientSet::new().with_client("ringshub", Box::new(ledger.clone()));
        Dispatcher::new(clients, Box::new(collector.clone()), batch_size)
    }

    #[test]
    fn test_run_id_lives_between_start_and_end() {
        let ledger = InMemoryLedger::new(Duration::from_secs(30));
        let collector = MemoryCollector::new();
        let mut dispatcher = dispatcher(&ledger, &collector, 2);
        assert_eq!(dispatcher.run_id(), None);

        let parameters = RunParameters {
            start_time: chrono::Utc::now(),
            network_size: 5,
            batch_size: 2,
            iterations: 1,
            blocks_per_iteration: 720,
            block_time: 5,
            seed: 1,
            profiles: vec!["honest".to_string()],
            actions: Vec::new(),
        };
        let run_id = dispatcher.start_run(&parameters, "run id");
        assert!(run_id.is_some());
        assert_eq!(dispatcher.run_id(), run_id);

        dispatcher.record_iteration(&IterationStatistics::new(0, 0));
        dispatcher.end_run();
        assert_eq!(dispatcher.run_id(), None);

        let collected = collector.collected();
        assert_eq!(collected.run_id, run_id);
        assert_eq!(collected.iterations[0].0, run_id.unwrap());
        assert!(collected.ended);
    }

    #[test]
    fn test_dispatch_reconciles_confirmed_outcomes() {
        let ledger = InMemoryLedger::new(Duration::from_secs(30));
        let collector = MemoryCollector::new();
        let mut dispatcher = dispatcher(&ledger, &collector, 2);
        let mut state = state_with_agents(5);
        let requests = register_requests(&state);
        let mut stats = IterationStatistics::new(0, 7);

        dispatcher
            .dispatch(&mut state, &requests, ChainHead { block: 7, timestamp: 0 }, &mut stats)
            .unwrap();

        assert_eq!(stats.total_actions, 5);
        assert_eq!(stats.successful_actions, 5);
        assert_eq!(state.tracker.human_count(), 5);
        let agent = state.agents.agent("honest-0000").unwrap();
        assert_eq!(agent.last_executed("ringshub_RegisterHuman"), Some(7));
        assert_eq!(collector.collected().outcomes.len(), 5);
    }

    #[test]
    fn test_unavailable_backend_stops_after_reconciling_batch() {
        let ledger = InMemoryLedger::new(Duration::from_secs(30));
        ledger.set_reachable(false).unwrap();
        let collector = MemoryCollector::new();
        let mut dispatcher = dispatcher(&ledger, &collector, 2);
        let mut state = state_with_agents(5);
        let requests = register_requests(&state);
        let mut stats = IterationStatistics::new(1, 0);

        let result = dispatcher.dispatch(&mut state, &requests, ChainHead::default(), &mut stats);
        assert!(matches!(result, Err(EngineError::BackendUnavailable(_))));
        // Only the first batch was submitted.
        assert_eq!(stats.total_actions, 2);
        assert_eq!(stats.successful_actions, 0);
        assert_eq!(state.tracker.human_count(), 0);
    }

    #[test]
    fn test_group_account_is_adopted() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        let collector = MemoryCollector::new();
        let mut dispatcher = dispatcher(&ledger, &collector, 10);
        let mut state = state_with_agents(1);
        let mut stats = IterationStatistics::new(1, 0);

        let primary = state.agents.agent("honest-0000").unwrap().primary().unwrap().clone();
        ledger
            .call(&OperationRequest {
                client: "ringshub".to_string(),
                action: "setup".to_string(),
                agent: "honest-0000".to_string(),
                sender: primary,
                call: Call::RegisterHuman { inviter: None },
                gas_limit: 500_000,
                new_account: None,
            })
            .unwrap();

        let group = Address::parse("0x00000000000000000000000000000000000000ff").unwrap();
        let request = OperationRequest {
            client: "ringshub".to_string(),
            action: "ringshub_RegisterGroup".to_string(),
            agent: "honest-0000".to_string(),
            sender: group.clone(),
            call: Call::RegisterGroup { name: "RingsGroup1".to_string(), symbol: "RG1".to_string() },
            gas_limit: 500_000,
            new_account: Some(group.clone()),
        };
        dispatcher
            .dispatch(&mut state, &[request], ChainHead::default(), &mut stats)
            .unwrap();

        assert!(state.tracker.is_group(&group));
        assert_eq!(state.agents.agent_by_address(&group).unwrap().id, "honest-0000");
    }

    #[test]
    fn test_audit_matches_backend() {
        let ledger = InMemoryLedger::new(Duration::from_secs(30));
        let collector = MemoryCollector::new();
        let mut dispatcher = dispatcher(&ledger, &collector, 10);
        let mut state = state_with_agents(3);
        let requests = register_requests(&state);
        let mut stats = IterationStatistics::new(0, 0);
        dispatcher
            .dispatch(&mut state, &requests, ChainHead::default(), &mut stats)
            .unwrap();

        assert_eq!(dispatcher.audit(&state).unwrap(), 0);
    }
}
