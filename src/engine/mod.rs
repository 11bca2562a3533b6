//! Scheduling and evolution engine.
//!
//! - `dispatch`: batch → submit → reconcile → record, shared by both phases
//! - `builder`: population bootstrap and initial actions
//! - `evolver`: time advancement and the per-iteration selection loop
//! - `stats`: iteration statistics and run summaries

pub mod builder;
pub mod dispatch;
pub mod evolver;
pub mod stats;

use rand_chacha::ChaCha8Rng;

use crate::agent::{AgentError, AgentManager, DistributionError, ProfileError};
use crate::registry::RegistryError;
use crate::state::BalanceTracker;

pub use builder::{BuildReport, NetworkBuilder};
pub use dispatch::Dispatcher;
pub use evolver::{EvolverPhase, NetworkEvolver};
pub use stats::{ActionTally, IterationStatistics, RunSummary};

/// Seeded random source threaded through the builder and evolver.
pub type SimRng = ChaCha8Rng;

/// The agent population and the snapshot of the ledger it acts on.
#[derive(Debug, Default)]
pub struct NetworkState {
    pub agents: AgentManager,
    pub tracker: BalanceTracker,
}

impl NetworkState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Errors raised by the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("evolver is aborted; no further iterations can run")]
    Aborted,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Distribution(#[from] DistributionError),

    #[error("population mismatch: expected {expected} agents, created {created}")]
    PopulationMismatch { expected: usize, created: usize },
}

/// An iteration that stopped before all of its batches were submitted.
///
/// Outcomes of the batches that did return are reconciled and counted in
/// `partial`.
#[derive(Debug, thiserror::Error)]
#[error("iteration {iteration} aborted: {source}")]
pub struct IterationAborted {
    pub iteration: u64,
    pub partial: IterationStatistics,
    #[source]
    pub source: EngineError,
}

/// A network build that stopped before every initial action completed.
///
/// `partial` is present once initial actions started; outcomes it counts are
/// already applied to the network state.
#[derive(Debug, thiserror::Error)]
#[error("network build aborted: {source}")]
pub struct BuildAborted {
    pub partial: Option<BuildReport>,
    #[source]
    pub source: EngineError,
}

impl From<EngineError> for BuildAborted {
    fn from(source: EngineError) -> Self {
        Self { partial: None, source }
    }
}
