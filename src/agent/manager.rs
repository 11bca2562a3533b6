//! Agent population management.

use log::{debug, info, warn};
use rand::Rng;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use super::profile::Profile;
use super::types::Agent;
use super::AgentError;
use crate::client::types::Address;

/// Owns the agent population and its address index.
#[derive(Debug, Default)]
pub struct AgentManager {
    agents: Vec<Agent>,
    by_id: HashMap<String, usize>,
    by_address: BTreeMap<Address, usize>,
}

impl AgentManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create agents for every `(profile, count)` entry of `allocation`.
    ///
    /// Agent ids are `"{profile}-{index:04}"`. Each agent receives the
    /// profile's `target_account_count` accounts: preset addresses are used
    /// first (one per agent, in order), the rest are derived from `rng`.
    ///
    /// # Returns
    ///
    /// * The number of agents created
    pub fn create_agents<R: Rng + ?Sized>(
        &mut self,
        allocation: &[(String, usize)],
        profiles: &BTreeMap<String, Arc<Profile>>,
        initial_state: &BTreeMap<String, String>,
        rng: &mut R,
    ) -> Result<usize, AgentError> {
        let mut created = 0;
        for (profile_name, count) in allocation {
            let profile = profiles
                .get(profile_name)
                .ok_or_else(|| AgentError::UnknownProfile(profile_name.clone()))?;

            for index in 0..*count {
                let id = format!("{}-{:04}", profile_name, index);
                let mut accounts = Vec::with_capacity(profile.target_account_count);
                if let Some(preset) = profile.preset_addresses.get(index) {
                    accounts.push(preset.clone());
                }
                while accounts.len() < profile.target_account_count {
                    accounts.push(Address::random(rng));
                }

                let mut agent = Agent::new(id, Arc::clone(profile), Vec::new());
                for (key, value) in initial_state {
                    agent.set_attribute(key.clone(), value.clone());
                }
                self.insert(agent, accounts)?;
                created += 1;
            }
            debug!("Created {} agents for profile '{}'", count, profile_name);
        }
        info!("Created {} agents ({} total)", created, self.agents.len());
        Ok(created)
    }

    fn insert(&mut self, mut agent: Agent, accounts: Vec<Address>) -> Result<(), AgentError> {
        if self.by_id.contains_key(&agent.id) {
            return Err(AgentError::DuplicateAgent(agent.id));
        }
        let index = self.agents.len();
        for account in accounts {
            if let Some(owner) = self.by_address.get(&account) {
                return Err(AgentError::DuplicateAccount {
                    account,
                    owner: self.agents[*owner].id.clone(),
                });
            }
            self.by_address.insert(account.clone(), index);
            agent.push_account(account);
        }
        self.by_id.insert(agent.id.clone(), index);
        self.agents.push(agent);
        Ok(())
    }

    /// Give `agent_id` ownership of an account created by a confirmed outcome.
    ///
    /// Returns `false` if the agent is unknown or the account already has an
    /// owner.
    pub fn adopt_account(&mut self, agent_id: &str, account: Address) -> bool {
        let Some(&index) = self.by_id.get(agent_id) else {
            warn!("Cannot adopt {} for unknown agent '{}'", account, agent_id);
            return false;
        };
        if let Some(owner) = self.by_address.get(&account) {
            warn!("Account {} is already owned by '{}'", account, self.agents[*owner].id);
            return false;
        }
        debug!("Agent '{}' adopts account {}", agent_id, account);
        self.by_address.insert(account.clone(), index);
        self.agents[index].push_account(account);
        true
    }

    pub fn get(&self, index: usize) -> Option<&Agent> {
        self.agents.get(index)
    }

    pub fn agent(&self, id: &str) -> Option<&Agent> {
        self.by_id.get(id).map(|index| &self.agents[*index])
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut Agent> {
        self.by_id.get(id).map(|index| &mut self.agents[*index])
    }

    /// Owner of `account`
    pub fn agent_by_address(&self, account: &Address) -> Option<&Agent> {
        self.by_address.get(account).map(|index| &self.agents[*index])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Number of agents per profile
    pub fn count_by_profile(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for agent in &self.agents {
            *counts.entry(agent.profile.name.clone()).or_insert(0) += 1;
        }
        counts
    }
}
