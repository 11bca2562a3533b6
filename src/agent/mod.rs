//! Agent and profile model.
//!
//! - `types`: the [`Agent`] entity (accounts, cooldown clock, counters)
//! - `profile`: typed, immutable behavioral profiles
//! - `manager`: population ownership and address lookup
//! - `distribution`: allocation of a population across profiles

pub mod distribution;
pub mod manager;
pub mod profile;
pub mod types;

pub use distribution::{allocate_agents, DistributionError};
pub use manager::AgentManager;
pub use profile::{ActionConfig, Profile, ProfileError};
pub use types::Agent;

use crate::client::types::Address;

/// Errors raised while creating the agent population
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("no profile named '{0}'")]
    UnknownProfile(String),

    #[error("duplicate agent id '{0}'")]
    DuplicateAgent(String),

    #[error("account {account} is already owned by '{owner}'")]
    DuplicateAccount { account: Address, owner: String },
}
