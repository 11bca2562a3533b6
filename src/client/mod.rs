//! Execution client contract.
//!
//! An execution client fronts one external contract or service. The engine
//! only depends on this request/response contract:
//!
//! - `call` submits a state-mutating request and returns its outcome
//! - `view` answers a read-only query
//!
//! Errors are split into per-operation failures (recorded as failed
//! outcomes, the run continues) and [`ClientError::Unavailable`], which stops
//! the run.

pub mod memory;
pub mod types;

use log::debug;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

pub use memory::InMemoryLedger;
pub use types::{Address, Amount, Call, ChainHead, OperationRequest, Outcome, Query, ViewValue, ONE_TOKEN};

/// Errors raised by execution clients and chain control
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("call rejected by backend: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported query: {0}")]
    Unsupported(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl ClientError {
    /// Whether this error stops the run instead of failing a single operation.
    pub fn is_run_stopping(&self) -> bool {
        matches!(self, ClientError::Unavailable(_))
    }
}

/// A client for one external contract or service.
pub trait ExecutionClient: Send {
    /// Submit a state-mutating request.
    fn call(&mut self, request: &OperationRequest) -> Result<Outcome, ClientError>;

    /// Answer a read-only query.
    fn view(&self, query: &Query) -> Result<ViewValue, ClientError>;

    /// Submit several requests in order. Results line up with `requests`.
    fn call_batch(&mut self, requests: &[&OperationRequest]) -> Vec<Result<Outcome, ClientError>> {
        requests.iter().map(|request| self.call(request)).collect()
    }
}

/// Control over simulated time on the backend.
pub trait ChainControl {
    /// Mine `blocks` blocks spaced `seconds_per_block` apart.
    fn mine(&mut self, blocks: u64, seconds_per_block: u64) -> Result<ChainHead, ClientError>;

    fn head(&self) -> Result<ChainHead, ClientError>;
}

/// Named execution clients, keyed by the name requests refer to.
#[derive(Default)]
pub struct ClientSet {
    clients: BTreeMap<String, Box<dyn ExecutionClient>>,
}

impl ClientSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client under `name`, replacing any previous one.
    pub fn with_client(mut self, name: impl Into<String>, client: Box<dyn ExecutionClient>) -> Self {
        self.clients.insert(name.into(), client);
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn ExecutionClient> {
        self.clients.get(name).map(|client| client.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Submit one batch.
    ///
    /// Requests are grouped per client; groups for different clients run in
    /// parallel, requests within a group keep their relative order. The
    /// returned results line up with `batch`.
    pub fn submit(&mut self, batch: &[OperationRequest]) -> Vec<Result<Outcome, ClientError>> {
        let mut grouped: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (index, request) in batch.iter().enumerate() {
            grouped.entry(request.client.as_str()).or_default().push(index);
        }

        let jobs: Vec<(&mut Box<dyn ExecutionClient>, Vec<usize>)> = self
            .clients
            .iter_mut()
            .filter_map(|(name, client)| grouped.remove(name.as_str()).map(|indices| (client, indices)))
            .collect();

        let mut results: Vec<Option<Result<Outcome, ClientError>>> = (0..batch.len()).map(|_| None).collect();

        for (name, indices) in grouped {
            debug!("No execution client named '{}' for {} request(s)", name, indices.len());
            for index in indices {
                results[index] = Some(Err(ClientError::Transport(format!("no execution client named '{}'", name))));
            }
        }

        let finished: Vec<Vec<(usize, Result<Outcome, ClientError>)>> = jobs
            .into_par_iter()
            .map(|(client, indices)| {
                let requests: Vec<&OperationRequest> = indices.iter().map(|&index| &batch[index]).collect();
                let outcomes = client.call_batch(&requests);
                indices.into_iter().zip(outcomes).collect()
            })
            .collect();

        for (index, result) in finished.into_iter().flatten() {
            results[index] = Some(result);
        }

        results
            .into_iter()
            .map(|result| result.unwrap_or_else(|| Err(ClientError::Transport("client returned no result".to_string()))))
            .collect()
    }
}

impl std::fmt::Debug for ClientSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSet").field("clients", &self.clients.keys().collect::<Vec<_>>()).finish()
    }
}
