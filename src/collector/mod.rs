//! Data collection for simulation runs.
//!
//! The engine reports to a [`DataCollector`] at fixed points: run start,
//! after every outcome, after every iteration and at run end. Collectors
//! are fire-and-forget from the engine's point of view: a failed write is
//! logged and never stops scheduling.
//!
//! ## Implementations
//!
//! - [`NullCollector`]: discards everything (fast mode)
//! - [`MemoryCollector`]: keeps records behind a shared handle for inspection
//! - [`JsonlCollector`]: appends one JSON record per line to a file

pub mod jsonl;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::client::types::Outcome;
use crate::engine::stats::IterationStatistics;

pub use jsonl::JsonlCollector;

/// Identifier of a collected run
pub type RunId = u64;

/// Errors raised by collectors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("collector I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("no run has been started")]
    NoActiveRun,

    #[error("collector state poisoned")]
    Poisoned,
}

/// Parameters recorded when a run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParameters {
    pub start_time: DateTime<Utc>,
    pub network_size: usize,
    pub batch_size: usize,
    pub iterations: u64,
    pub blocks_per_iteration: u64,
    pub block_time: u64,
    pub seed: u64,
    pub profiles: Vec<String>,
    pub actions: Vec<String>,
}

/// Sink for run data.
pub trait DataCollector {
    fn start_run(&mut self, parameters: &RunParameters, description: &str) -> Result<RunId, CollectorError>;

    fn record_events(&mut self, outcome: &Outcome) -> Result<(), CollectorError>;

    fn record_iteration_stats(
        &mut self,
        run_id: RunId,
        iteration: u64,
        stats: &IterationStatistics,
    ) -> Result<(), CollectorError>;

    fn end_run(&mut self) -> Result<(), CollectorError>;
}

/// Collector that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl DataCollector for NullCollector {
    fn start_run(&mut self, _parameters: &RunParameters, _description: &str) -> Result<RunId, CollectorError> {
        Ok(0)
    }

    fn record_events(&mut self, _outcome: &Outcome) -> Result<(), CollectorError> {
        Ok(())
    }

    fn record_iteration_stats(
        &mut self,
        _run_id: RunId,
        _iteration: u64,
        _stats: &IterationStatistics,
    ) -> Result<(), CollectorError> {
        Ok(())
    }

    fn end_run(&mut self) -> Result<(), CollectorError> {
        Ok(())
    }
}

/// Everything a [`MemoryCollector`] has seen.
#[derive(Debug, Clone, Default)]
pub struct CollectedRun {
    pub run_id: Option<RunId>,
    pub parameters: Option<RunParameters>,
    pub description: String,
    pub outcomes: Vec<Outcome>,
    pub iterations: Vec<(RunId, u64, IterationStatistics)>,
    pub ended: bool,
}

/// In-memory collector; clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollector {
    records: Arc<Mutex<CollectedRun>>,
}

impl MemoryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything collected so far
    pub fn collected(&self) -> CollectedRun {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut CollectedRun) -> T) -> Result<T, CollectorError> {
        let mut records = self.records.lock().map_err(|_| CollectorError::Poisoned)?;
        Ok(f(&mut records))
    }
}

impl DataCollector for MemoryCollector {
    fn start_run(&mut self, parameters: &RunParameters, description: &str) -> Result<RunId, CollectorError> {
        self.with_records(|records| {
            let run_id = records.run_id.map_or(1, |id| id + 1);
            records.run_id = Some(run_id);
            records.parameters = Some(parameters.clone());
            records.description = description.to_string();
            records.ended = false;
            run_id
        })
    }

    fn record_events(&mut self, outcome: &Outcome) -> Result<(), CollectorError> {
        self.with_records(|records| records.outcomes.push(outcome.clone()))
    }

    fn record_iteration_stats(
        &mut self,
        run_id: RunId,
        iteration: u64,
        stats: &IterationStatistics,
    ) -> Result<(), CollectorError> {
        self.with_records(|records| records.iterations.push((run_id, iteration, stats.clone())))
    }

    fn end_run(&mut self) -> Result<(), CollectorError> {
        self.with_records(|records| {
            if records.run_id.is_none() {
                return Err(CollectorError::NoActiveRun);
            }
            records.ended = true;
            Ok(())
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parameters() -> RunParameters {
        RunParameters {
            start_time: Utc::now(),
            network_size: 20,
            batch_size: 10,
            iterations: 10,
            blocks_per_iteration: 100,
            block_time: 5,
            seed: 1,
            profiles: vec!["honest".to_string()],
            actions: Vec::new(),
        }
    }

    #[test]
    fn test_memory_collector_shares_records_between_clones() {
        let collector = MemoryCollector::new();
        let mut handle = collector.clone();

        let run_id = handle.start_run(&parameters(), "test run").unwrap();
        handle.record_iteration_stats(run_id, 1, &IterationStatistics::new(1, 100)).unwrap();
        handle.end_run().unwrap();

        let collected = collector.collected();
        assert_eq!(collected.run_id, Some(1));
        assert_eq!(collected.description, "test run");
        assert_eq!(collected.iterations.len(), 1);
        assert!(collected.ended);
    }

    #[test]
    fn test_end_without_start_fails() {
        let mut collector = MemoryCollector::new();
        assert!(matches!(collector.end_run(), Err(CollectorError::NoActiveRun)));
    }
}
