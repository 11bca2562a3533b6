//! Simulation configuration.
//!
//! A run is described by two YAML documents:
//!
//! - the **network** file: population size, batching, iteration count,
//!   simulated time per iteration and bootstrap actions
//! - the **agents** file: how the population is split across profiles and
//!   what each profile does
//!
//! ```yaml
//! # network.yaml
//! network_size: 20
//! batch_size: 10
//! iterations: 10
//! blocks_per_iteration: 100
//! block_time: 5s
//! seed: 42
//! initial_actions:
//!   - ringshub_RegisterHuman
//!   - action: ringshub_Trust
//!     profile: honest
//! ```
//!
//! ```yaml
//! # agents.yaml
//! agent_distribution:
//!   honest: 18
//!   hub: 2
//! profiles:
//!   honest:
//!     actions:
//!       ringshub_Trust:
//!         probability: 0.3
//!         cooldown_blocks: 100
//!         constraints:
//!           max_trust_edges: 10
//! ```
//!
//! Mappings whose order matters (`agent_distribution`, `profiles`,
//! `actions`) keep their YAML order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::client::types::Address;
use crate::utils::validation::{validate_distribution, validate_probability, validate_token_amount};

/// Gas ceiling used when an action does not configure one.
pub const DEFAULT_GAS_LIMIT: u64 = 500_000;

fn default_network_size() -> usize {
    20
}

fn default_batch_size() -> usize {
    10
}

fn default_iterations() -> u64 {
    10
}

fn default_blocks_per_iteration() -> u64 {
    100
}

fn default_block_time() -> u64 {
    5
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_account_count() -> usize {
    1
}

/// Run parameters from the network file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_size", alias = "size")]
    pub network_size: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_iterations")]
    pub iterations: u64,
    #[serde(default = "default_blocks_per_iteration")]
    pub blocks_per_iteration: u64,
    /// Seconds per block; accepts `5` or `"5s"`.
    #[serde(default = "default_block_time", with = "crate::utils::duration::seconds")]
    pub block_time: u64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub call_timeout: Duration,
    /// Compare tracked balances with the backend every N iterations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_every: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub initial_actions: Vec<InitialAction>,
    /// Attributes stamped on every agent at build time.
    #[serde(default)]
    pub initial_state: BTreeMap<String, String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            network_size: default_network_size(),
            batch_size: default_batch_size(),
            iterations: default_iterations(),
            blocks_per_iteration: default_blocks_per_iteration(),
            block_time: default_block_time(),
            seed: 0,
            call_timeout: default_call_timeout(),
            audit_every: None,
            description: None,
            initial_actions: Vec::new(),
            initial_state: BTreeMap::new(),
        }
    }
}

impl NetworkConfig {
    /// Validate the network parameters
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("network_size", self.network_size as u64),
            ("batch_size", self.batch_size as u64),
            ("blocks_per_iteration", self.blocks_per_iteration),
            ("block_time", self.block_time),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ValidationError::InvalidNetwork(format!("{} must be greater than 0", field)));
            }
        }
        if self.call_timeout.is_zero() {
            return Err(ValidationError::InvalidNetwork("call_timeout must be greater than 0".to_string()));
        }
        if self.audit_every == Some(0) {
            return Err(ValidationError::InvalidNetwork("audit_every must be greater than 0".to_string()));
        }
        for initial in &self.initial_actions {
            if initial.action.trim().is_empty() {
                return Err(ValidationError::InvalidNetwork("initial action name cannot be empty".to_string()));
            }
        }
        Ok(())
    }
}

/// One bootstrap action run by the network builder.
///
/// Written either as a bare action name or as a mapping that restricts the
/// action to one profile and/or the first `count` matching agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "InitialActionRepr")]
pub struct InitialAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl InitialAction {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            profile: None,
            count: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InitialActionRepr {
    Name(String),
    Filtered {
        action: String,
        #[serde(default)]
        profile: Option<String>,
        #[serde(default)]
        count: Option<usize>,
    },
}

impl From<InitialActionRepr> for InitialAction {
    fn from(repr: InitialActionRepr) -> Self {
        match repr {
            InitialActionRepr::Name(action) => InitialAction::new(action),
            InitialActionRepr::Filtered { action, profile, count } => InitialAction { action, profile, count },
        }
    }
}

/// Typed per-action constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Constraints {
    /// The agent's primary account must be a registered avatar.
    pub require_registered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_trust_edges: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_trusted_by: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_groups: Option<usize>,
    /// Lifetime of newly created trust edges.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_duration_days: Option<u64>,
}

/// Per-action settings of a profile, as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionSettings {
    pub probability: f64,
    #[serde(default)]
    pub cooldown_blocks: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Minimum balance in tokens.
    #[serde(default)]
    pub min_balance: f64,
    /// Largest amount moved by one action, in tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub constraints: Constraints,
}

/// Profile definition, as written in YAML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_account_count")]
    pub target_account_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_actions_per_iteration: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub preset_addresses: Vec<String>,
    #[serde(default, with = "ordered_map")]
    pub actions: Vec<(String, ActionSettings)>,
}

impl ProfileConfig {
    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        let invalid = |message: String| ValidationError::InvalidProfile(format!("{}: {}", name, message));

        if self.target_account_count == 0 {
            return Err(invalid("target_account_count must be at least 1".to_string()));
        }
        for address in &self.preset_addresses {
            Address::parse(address).map_err(|e| invalid(e.to_string()))?;
        }
        for (action, settings) in &self.actions {
            validate_probability(action, settings.probability).map_err(&invalid)?;
            validate_token_amount(&format!("{}.min_balance", action), settings.min_balance).map_err(&invalid)?;
            if let Some(max_value) = settings.max_value {
                validate_token_amount(&format!("{}.max_value", action), max_value).map_err(&invalid)?;
                if max_value == 0.0 {
                    return Err(invalid(format!("{}.max_value must be greater than 0", action)));
                }
            }
            if settings.gas_limit == 0 {
                return Err(invalid(format!("{}.gas_limit must be greater than 0", action)));
            }
            if settings.constraints.trust_duration_days == Some(0) {
                return Err(invalid(format!("{}.constraints.trust_duration_days must be greater than 0", action)));
            }
        }
        Ok(())
    }
}

/// Population split and profile definitions from the agents file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(with = "ordered_map")]
    pub agent_distribution: Vec<(String, u32)>,
    #[serde(with = "ordered_map")]
    pub profiles: Vec<(String, ProfileConfig)>,
}

impl AgentConfig {
    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.iter().find(|(profile, _)| profile == name).map(|(_, config)| config)
    }

    /// Validate the distribution and every profile
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_distribution(&self.agent_distribution).map_err(ValidationError::InvalidAgent)?;
        for (profile, _) in &self.agent_distribution {
            if self.profile(profile).is_none() {
                return Err(ValidationError::InvalidAgent(format!(
                    "agent_distribution references undefined profile '{}'",
                    profile
                )));
            }
        }
        for (name, profile) in &self.profiles {
            profile.validate(name)?;
        }
        Ok(())
    }
}

/// Both configuration files of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub network: NetworkConfig,
    pub agents: AgentConfig,
}

impl SimulationConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.network.validate()?;
        self.agents.validate()?;

        for initial in &self.network.initial_actions {
            if let Some(profile) = &initial.profile {
                if !self.agents.agent_distribution.iter().any(|(name, _)| name == profile) {
                    return Err(ValidationError::InvalidNetwork(format!(
                        "initial action '{}' targets profile '{}' which is not in agent_distribution",
                        initial.action, profile
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid network configuration: {0}")]
    InvalidNetwork(String),
    #[error("Invalid agent configuration: {0}")]
    InvalidAgent(String),
    #[error("Invalid profile configuration: {0}")]
    InvalidProfile(String),
}

/// YAML mappings read into `Vec<(String, V)>` so that their order survives.
mod ordered_map {
    use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
    use serde::ser::{Serialize, SerializeMap, Serializer};
    use std::fmt;
    use std::marker::PhantomData;

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S, V>(entries: &Vec<(String, V)>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (key, value) in entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<Vec<(String, V)>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de>,
    {
        struct OrderedVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedVisitor<V> {
            type Value = Vec<(String, V)>;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a mapping")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries: Vec<(String, V)> = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if entries.iter().any(|(existing, _)| *existing == key) {
                        return Err(de::Error::custom(format!("duplicate key '{}'", key)));
                    }
                    entries.push((key, value));
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(OrderedVisitor(PhantomData))
    }
}
