//! Behavioral profiles.
//!
//! A [`Profile`] is built once from its YAML form and shared between all
//! agents of that profile through an `Arc`. Token-denominated settings are
//! converted to base units here so that the rest of the engine only deals
//! with [`Amount`]s.

use serde::{Deserialize, Serialize};

use crate::client::types::{Address, AddressError, Amount, ONE_TOKEN};
use crate::config::{ActionSettings, Constraints, ProfileConfig, DEFAULT_GAS_LIMIT};

/// Errors raised while building or querying profiles
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("profile '{profile}' does not list action '{action}'")]
    UnknownActionForProfile { profile: String, action: String },

    #[error("profile '{profile}': {source}")]
    InvalidPresetAddress {
        profile: String,
        #[source]
        source: AddressError,
    },
}

/// Convert a token amount from configuration into base units.
pub fn tokens_to_amount(tokens: f64) -> Amount {
    if tokens <= 0.0 || !tokens.is_finite() {
        return 0;
    }
    (tokens * ONE_TOKEN as f64).round() as Amount
}

/// Per-action behavior of one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub probability: f64,
    pub cooldown_blocks: u64,
    pub gas_limit: u64,
    /// Minimum balance across all of the agent's accounts, in base units.
    pub min_balance: Amount,
    /// Upper bound of a single transferred amount, in base units.
    pub max_value: Option<Amount>,
    pub constraints: Constraints,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            probability: 1.0,
            cooldown_blocks: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
            min_balance: 0,
            max_value: None,
            constraints: Constraints::default(),
        }
    }
}

impl From<&ActionSettings> for ActionConfig {
    fn from(settings: &ActionSettings) -> Self {
        Self {
            probability: settings.probability,
            cooldown_blocks: settings.cooldown_blocks,
            gas_limit: settings.gas_limit,
            min_balance: tokens_to_amount(settings.min_balance),
            max_value: settings.max_value.map(tokens_to_amount),
            constraints: settings.constraints.clone(),
        }
    }
}

/// Named behavioral template, immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub name: String,
    pub description: Option<String>,
    /// Accounts created per agent at build time.
    pub target_account_count: usize,
    /// Cap on actions fired per agent and iteration.
    pub max_actions_per_iteration: Option<usize>,
    pub preset_addresses: Vec<Address>,
    actions: Vec<(String, ActionConfig)>,
}

impl Profile {
    /// Build a profile from its configuration.
    pub fn from_config(name: &str, config: &ProfileConfig) -> Result<Self, ProfileError> {
        let preset_addresses = config
            .preset_addresses
            .iter()
            .map(|address| Address::parse(address))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| ProfileError::InvalidPresetAddress {
                profile: name.to_string(),
                source,
            })?;

        Ok(Self {
            name: name.to_string(),
            description: config.description.clone(),
            target_account_count: config.target_account_count.max(1),
            max_actions_per_iteration: config.max_actions_per_iteration,
            preset_addresses,
            actions: config
                .actions
                .iter()
                .map(|(action, settings)| (action.clone(), ActionConfig::from(settings)))
                .collect(),
        })
    }

    /// Profile with the given actions and no other settings.
    pub fn with_actions(name: &str, actions: Vec<(String, ActionConfig)>) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            target_account_count: 1,
            max_actions_per_iteration: None,
            preset_addresses: Vec::new(),
            actions,
        }
    }

    /// Configuration of `action` in this profile.
    ///
    /// Callers treat [`ProfileError::UnknownActionForProfile`] as "not
    /// applicable" rather than propagating it.
    pub fn action_config(&self, action: &str) -> Result<&ActionConfig, ProfileError> {
        self.actions
            .iter()
            .find(|(name, _)| name == action)
            .map(|(_, config)| config)
            .ok_or_else(|| ProfileError::UnknownActionForProfile {
                profile: self.name.clone(),
                action: action.to_string(),
            })
    }

    /// Actions in configuration order
    pub fn actions(&self) -> impl Iterator<Item = (&str, &ActionConfig)> {
        self.actions.iter().map(|(name, config)| (name.as_str(), config))
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_config(yaml: &str) -> ProfileConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_from_config_converts_token_amounts() {
        let config = profile_config(
            r#"
actions:
  ringshub_SafeTransferFrom:
    probability: 0.2
    cooldown_blocks: 10
    min_balance: 1.5
    max_value: 2
"#,
        );
        let profile = Profile::from_config("trader", &config).unwrap();
        let action = profile.action_config("ringshub_SafeTransferFrom").unwrap();

        assert_eq!(action.min_balance, 3 * ONE_TOKEN / 2);
        assert_eq!(action.max_value, Some(2 * ONE_TOKEN));
        assert_eq!(action.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(profile.target_account_count, 1);
    }

    #[test]
    fn test_unknown_action_is_reported() {
        let profile = Profile::with_actions("honest", Vec::new());
        let err = profile.action_config("ringshub_Trust").unwrap_err();
        assert!(matches!(err, ProfileError::UnknownActionForProfile { .. }));
    }

    #[test]
    fn test_invalid_preset_address_fails() {
        let config = profile_config(
            r#"
preset_addresses: ["0x1234"]
actions: {}
"#,
        );
        assert!(matches!(
            Profile::from_config("hub", &config),
            Err(ProfileError::InvalidPresetAddress { .. })
        ));
    }

    #[test]
    fn test_negative_tokens_convert_to_zero() {
        assert_eq!(tokens_to_amount(-1.0), 0);
        assert_eq!(tokens_to_amount(f64::NAN), 0);
        assert_eq!(tokens_to_amount(0.5), ONE_TOKEN / 2);
    }
}
