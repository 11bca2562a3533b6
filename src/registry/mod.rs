//! # Action Registry
//!
//! Catalog of the actions agents may attempt, keyed by name.
//!
//! ## Lifecycle
//!
//! 1. **Registration**: actions are added to an [`ActionRegistryBuilder`],
//!    either the built-in set or manifests discovered in a directory
//! 2. **Freeze**: [`ActionRegistryBuilder::build`] yields an immutable
//!    [`ActionRegistry`]
//! 3. **Validation**: every action named by a profile must be registered
//!    before the first iteration runs
//!
//! The frozen registry has no mutating methods, so the builder and evolver
//! can share it freely.
//!
//! ## Built-in actions
//!
//! Built-in names follow `<client>_<Method>`:
//!
//! ```text
//! ringshub_RegisterHuman     register the primary account as a human
//! ringshub_Trust             trust a registered avatar
//! ringshub_Untrust           revoke an active trust edge
//! ringshub_PersonalMint      mint accrued personal tokens
//! ringshub_SafeTransferFrom  transfer held tokens to a truster
//! ringshub_RegisterGroup     register a group from a fresh account
//! ```

pub mod discovery;

use log::{debug, info};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::actions::{ActionContext, ActionKind};
use crate::agent::Profile;
use crate::client::types::OperationRequest;

/// Execution client serving the built-in actions.
pub const RINGSHUB_CLIENT: &str = "ringshub";

/// Errors raised while building or querying the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("profile '{profile}' uses unregistered action '{action}'")]
    UnregisteredProfileAction { profile: String, action: String },

    #[error("failed to scan action directory {path:?}: {source}")]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A registered action: a name bound to a kind and the client serving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub name: String,
    pub kind: ActionKind,
    pub client: String,
}

impl ActionDescriptor {
    pub fn new(name: impl Into<String>, kind: ActionKind, client: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            client: client.into(),
        }
    }

    /// Built-in descriptor for `kind` on `client`
    pub fn builtin(kind: ActionKind, client: &str) -> Self {
        Self::new(format!("{}_{}", client, kind.builtin_suffix()), kind, client)
    }

    pub fn is_eligible(&self, ctx: &ActionContext<'_>) -> bool {
        self.kind.is_eligible(ctx)
    }

    /// Resolve a concrete request for `ctx.agent`, or `None` if the action
    /// has no valid parameters right now.
    pub fn resolve<R: Rng + ?Sized>(&self, ctx: &ActionContext<'_>, rng: &mut R) -> Option<OperationRequest> {
        let resolved = self.kind.resolve(ctx, rng)?;
        Some(OperationRequest {
            client: self.client.clone(),
            action: self.name.clone(),
            agent: ctx.agent.id.clone(),
            sender: resolved.sender,
            call: resolved.call,
            gas_limit: ctx.config.gas_limit,
            new_account: resolved.new_account,
        })
    }
}

/// Mutable registry used during startup.
#[derive(Debug, Default)]
pub struct ActionRegistryBuilder {
    actions: BTreeMap<String, ActionDescriptor>,
}

impl ActionRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `descriptor` under its name.
    pub fn register(&mut self, descriptor: ActionDescriptor) -> Result<&mut Self, RegistryError> {
        if self.actions.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateAction(descriptor.name));
        }
        debug!("Registered action '{}' ({} via {})", descriptor.name, descriptor.kind, descriptor.client);
        self.actions.insert(descriptor.name.clone(), descriptor);
        Ok(self)
    }

    /// Add every built-in action served by the `ringshub` client.
    pub fn with_builtin_actions(mut self) -> Self {
        for kind in ActionKind::ALL {
            let descriptor = ActionDescriptor::builtin(kind, RINGSHUB_CLIENT);
            self.actions.entry(descriptor.name.clone()).or_insert(descriptor);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Freeze the registry.
    pub fn build(self) -> ActionRegistry {
        info!("Action registry built with {} actions", self.actions.len());
        ActionRegistry { actions: self.actions }
    }
}

/// Immutable name -> descriptor mapping.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: BTreeMap<String, ActionDescriptor>,
}

impl ActionRegistry {
    /// Registry holding only the built-in actions
    pub fn builtin() -> Self {
        ActionRegistryBuilder::new().with_builtin_actions().build()
    }

    pub fn resolve(&self, name: &str) -> Result<&ActionDescriptor, RegistryError> {
        self.actions
            .get(name)
            .ok_or_else(|| RegistryError::UnknownAction(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionDescriptor> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Check that every action used by `profiles` is registered.
    pub fn validate_profiles<'a>(&self, profiles: impl IntoIterator<Item = &'a Profile>) -> Result<(), RegistryError> {
        for profile in profiles {
            for action in profile.action_names() {
                if !self.contains(action) {
                    return Err(RegistryError::UnregisteredProfileAction {
                        profile: profile.name.clone(),
                        action: action.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
