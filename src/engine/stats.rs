//! Iteration and run statistics.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attempts and successes of one action type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTally {
    pub attempted: u64,
    pub succeeded: u64,
}

impl ActionTally {
    pub fn failed(&self) -> u64 {
        self.attempted - self.succeeded
    }
}

/// Statistics of one iteration (or of the build phase).
///
/// `total_actions` counts actions that were selected and had parameters
/// resolved; actions dropped for lack of parameters never show up here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationStatistics {
    pub iteration: u64,
    pub block: u64,
    pub total_actions: u64,
    pub successful_actions: u64,
    pub action_counts: BTreeMap<String, ActionTally>,
}

impl IterationStatistics {
    pub fn new(iteration: u64, block: u64) -> Self {
        Self {
            iteration,
            block,
            ..Self::default()
        }
    }

    /// Record the outcome of one submitted action.
    pub fn record(&mut self, action: &str, success: bool) {
        self.total_actions += 1;
        let tally = self.action_counts.entry(action.to_string()).or_default();
        tally.attempted += 1;
        if success {
            self.successful_actions += 1;
            tally.succeeded += 1;
        }
    }

    pub fn failed_actions(&self) -> u64 {
        self.total_actions - self.successful_actions
    }

    /// Attempts of `action` in this iteration
    pub fn attempts_of(&self, action: &str) -> u64 {
        self.action_counts.get(action).map_or(0, |tally| tally.attempted)
    }

    pub fn successes_of(&self, action: &str) -> u64 {
        self.action_counts.get(action).map_or(0, |tally| tally.succeeded)
    }
}

/// Aggregate over all completed iterations of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub network_size: usize,
    pub iterations_completed: u64,
    pub total_actions: u64,
    pub successful_actions: u64,
    pub action_counts: BTreeMap<String, ActionTally>,
    /// Initial actions of the build, which may have stopped partway.
    /// Not included in `total_actions`.
    #[serde(default)]
    pub build: ActionTally,
    pub final_block: u64,
    pub duration_secs: f64,
    /// Reason the run ended before its configured iteration count.
    pub stopped_early: Option<String>,
}

impl RunSummary {
    /// Fold per-iteration statistics into a summary.
    pub fn from_iterations(network_size: usize, iterations: &[IterationStatistics]) -> Self {
        let mut summary = RunSummary {
            network_size,
            ..Self::default()
        };
        for stats in iterations {
            summary.iterations_completed += 1;
            summary.total_actions += stats.total_actions;
            summary.successful_actions += stats.successful_actions;
            summary.final_block = summary.final_block.max(stats.block);
            for (action, tally) in &stats.action_counts {
                let total = summary.action_counts.entry(action.clone()).or_default();
                total.attempted += tally.attempted;
                total.succeeded += tally.succeeded;
            }
        }
        summary
    }

    pub fn completed(&self) -> bool {
        self.stopped_early.is_none()
    }
}
