//! Agent type definitions.
//!
//! An agent is one simulated participant: a set of owned accounts, a shared
//! profile and the bookkeeping the scheduler needs (cooldown clock and action
//! counters).

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::profile::Profile;
use crate::client::types::{Address, Amount};
use crate::state::BalanceTracker;

/// One simulated participant.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: String,
    pub profile: Arc<Profile>,
    accounts: Vec<Address>,
    /// action -> step of the last successful execution
    last_executed: HashMap<String, u64>,
    action_counts: BTreeMap<String, u64>,
    attributes: BTreeMap<String, String>,
}

impl Agent {
    /// Create an agent owning `accounts`; the first one is its primary account.
    pub fn new(id: impl Into<String>, profile: Arc<Profile>, accounts: Vec<Address>) -> Self {
        Self {
            id: id.into(),
            profile,
            accounts,
            last_executed: HashMap::new(),
            action_counts: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// Primary account, if the agent owns any
    pub fn primary(&self) -> Option<&Address> {
        self.accounts.first()
    }

    pub fn accounts(&self) -> &[Address] {
        &self.accounts
    }

    pub fn owns(&self, account: &Address) -> bool {
        self.accounts.contains(account)
    }

    pub(crate) fn push_account(&mut self, account: Address) {
        self.accounts.push(account);
    }

    /// Whether enough steps have passed since the last successful `action`.
    ///
    /// Actions never executed are always eligible, as are actions the
    /// profile does not list.
    pub fn is_cooldown_elapsed(&self, action: &str, current_step: u64) -> bool {
        let Some(last) = self.last_executed.get(action) else {
            return true;
        };
        match self.profile.action_config(action) {
            Ok(config) => current_step.saturating_sub(*last) >= config.cooldown_blocks,
            Err(_) => true,
        }
    }

    /// Whether the agent's accounts together hold at least `min_balance`.
    pub fn has_sufficient_balance(&self, min_balance: Amount, tracker: &BalanceTracker) -> bool {
        if min_balance == 0 {
            return true;
        }
        let total: Amount = self
            .accounts
            .iter()
            .map(|account| tracker.total_balance(account))
            .fold(0, Amount::saturating_add);
        total >= min_balance
    }

    /// Record a successful execution of `action` at `step`.
    pub fn record_success(&mut self, action: &str, step: u64) {
        self.last_executed.insert(action.to_string(), step);
        *self.action_counts.entry(action.to_string()).or_insert(0) += 1;
    }

    pub fn last_executed(&self, action: &str) -> Option<u64> {
        self.last_executed.get(action).copied()
    }

    /// Successful executions of `action` so far
    pub fn action_count(&self, action: &str) -> u64 {
        self.action_counts.get(action).copied().unwrap_or(0)
    }

    pub fn action_counts(&self) -> &BTreeMap<String, u64> {
        &self.action_counts
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::profile::ActionConfig;
    use proptest::prelude::*;

    fn agent_with_cooldown(cooldown_blocks: u64) -> Agent {
        let config = ActionConfig {
            cooldown_blocks,
            ..ActionConfig::default()
        };
        let profile = Profile::with_actions("honest", vec![("ringshub_Trust".to_string(), config)]);
        Agent::new("honest-0000", Arc::new(profile), vec![Address::zero()])
    }

    #[test]
    fn test_cooldown_blocks_until_elapsed() {
        let mut agent = agent_with_cooldown(100);
        assert!(agent.is_cooldown_elapsed("ringshub_Trust", 0));

        agent.record_success("ringshub_Trust", 50);
        assert!(!agent.is_cooldown_elapsed("ringshub_Trust", 100));
        assert!(agent.is_cooldown_elapsed("ringshub_Trust", 150));
        assert_eq!(agent.action_count("ringshub_Trust"), 1);
    }

    #[test]
    fn test_action_counts_track_every_success() {
        let mut agent = agent_with_cooldown(0);
        agent.record_success("ringshub_Trust", 1);
        agent.record_success("ringshub_Trust", 2);
        agent.record_success("ringshub_PersonalMint", 2);

        let counts: Vec<_> = agent.action_counts().iter().map(|(action, n)| (action.as_str(), *n)).collect();
        assert_eq!(counts, vec![("ringshub_PersonalMint", 1), ("ringshub_Trust", 2)]);
        assert_eq!(agent.action_count("ringshub_SafeTransferFrom"), 0);
    }

    #[test]
    fn test_unlisted_action_is_never_cooling_down() {
        let mut agent = agent_with_cooldown(100);
        agent.record_success("ringshub_PersonalMint", 10);
        assert!(agent.is_cooldown_elapsed("ringshub_PersonalMint", 10));
    }

    #[test]
    fn test_zero_min_balance_is_always_sufficient() {
        let agent = agent_with_cooldown(0);
        assert!(agent.has_sufficient_balance(0, &BalanceTracker::new()));
        assert!(!agent.has_sufficient_balance(1, &BalanceTracker::new()));
    }

    proptest! {
        #[test]
        fn prop_cooldown_is_monotonic(cooldown in 0u64..500, executed in 0u64..1_000, t in 0u64..2_000, dt in 0u64..2_000) {
            let mut agent = agent_with_cooldown(cooldown);
            agent.record_success("ringshub_Trust", executed);
            if agent.is_cooldown_elapsed("ringshub_Trust", t) {
                prop_assert!(agent.is_cooldown_elapsed("ringshub_Trust", t + dt));
            }
        }
    }
}
