//! Built-in action kinds.
//!
//! Every registered action maps onto one [`ActionKind`]. A kind supplies two
//! things to the scheduler:
//!
//! - an eligibility predicate over the agent and the current snapshot
//! - a parameter resolver that turns a selected action into a concrete call
//!
//! Resolvers only read the snapshot and the agent. They return `None` when
//! no valid parameters exist (no one left to trust, nothing to transfer);
//! such actions are dropped without being counted.

pub mod group;
pub mod human;
pub mod transfer;
pub mod trust;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agent::{ActionConfig, Agent};
use crate::client::types::{Address, Call, ChainHead};
use crate::state::BalanceTracker;

/// Closed set of operations an agent can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    RegisterHuman,
    Trust,
    Untrust,
    PersonalMint,
    Transfer,
    RegisterGroup,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::RegisterHuman,
        ActionKind::Trust,
        ActionKind::Untrust,
        ActionKind::PersonalMint,
        ActionKind::Transfer,
        ActionKind::RegisterGroup,
    ];

    /// Suffix of the built-in action name (`<client>_<suffix>`).
    pub fn builtin_suffix(&self) -> &'static str {
        match self {
            ActionKind::RegisterHuman => "RegisterHuman",
            ActionKind::Trust => "Trust",
            ActionKind::Untrust => "Untrust",
            ActionKind::PersonalMint => "PersonalMint",
            ActionKind::Transfer => "SafeTransferFrom",
            ActionKind::RegisterGroup => "RegisterGroup",
        }
    }

    /// Whether the action may run for `ctx.agent` right now.
    ///
    /// Cooldown and probability are not part of eligibility; the evolver
    /// applies them and the builder skips them.
    pub fn is_eligible(&self, ctx: &ActionContext<'_>) -> bool {
        let Some(primary) = ctx.agent.primary() else {
            return false;
        };
        if !ctx.agent.has_sufficient_balance(ctx.config.min_balance, ctx.tracker) {
            return false;
        }
        if !constraints_satisfied(*self, ctx, primary) {
            return false;
        }

        match self {
            ActionKind::RegisterHuman => human::can_register(ctx, primary),
            ActionKind::PersonalMint => human::can_mint(ctx, primary),
            ActionKind::Trust => trust::can_trust(ctx, primary),
            ActionKind::Untrust => trust::can_untrust(ctx, primary),
            ActionKind::Transfer => transfer::can_transfer(ctx),
            ActionKind::RegisterGroup => group::can_register_group(ctx, primary),
        }
    }

    /// Resolve concrete call parameters, or `None` if there are none.
    pub fn resolve<R: Rng + ?Sized>(&self, ctx: &ActionContext<'_>, rng: &mut R) -> Option<ResolvedCall> {
        let primary = ctx.agent.primary()?;
        match self {
            ActionKind::RegisterHuman => Some(human::resolve_register(primary)),
            ActionKind::PersonalMint => Some(human::resolve_mint(primary)),
            ActionKind::Trust => trust::resolve_trust(ctx, primary, rng),
            ActionKind::Untrust => trust::resolve_untrust(ctx, primary, rng),
            ActionKind::Transfer => transfer::resolve_transfer(ctx, rng),
            ActionKind::RegisterGroup => Some(group::resolve_register_group(ctx, rng)),
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.builtin_suffix())
    }
}

/// Everything a predicate or resolver may look at.
#[derive(Debug, Clone, Copy)]
pub struct ActionContext<'a> {
    pub agent: &'a Agent,
    pub config: &'a ActionConfig,
    pub tracker: &'a BalanceTracker,
    pub head: ChainHead,
}

impl ActionContext<'_> {
    /// Current simulated time
    pub fn now(&self) -> u64 {
        self.head.timestamp
    }
}

/// Parameters produced by a resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCall {
    pub sender: Address,
    pub call: Call,
    /// Account the agent owns once the call is confirmed.
    pub new_account: Option<Address>,
}

impl ResolvedCall {
    pub fn from_sender(sender: &Address, call: Call) -> Self {
        Self {
            sender: sender.clone(),
            call,
            new_account: None,
        }
    }
}

fn constraints_satisfied(kind: ActionKind, ctx: &ActionContext<'_>, primary: &Address) -> bool {
    let constraints = &ctx.config.constraints;
    let now = ctx.now();

    if constraints.require_registered && !ctx.tracker.is_registered(primary) {
        return false;
    }
    if let Some(min) = constraints.min_trusted_by {
        if ctx.tracker.trusted_by_count(primary, now) < min {
            return false;
        }
    }
    if let (ActionKind::Trust, Some(max)) = (kind, constraints.max_trust_edges) {
        if ctx.tracker.outgoing_active_trust(primary, now).len() >= max {
            return false;
        }
    }
    if let (ActionKind::RegisterGroup, Some(max)) = (kind, constraints.max_groups) {
        let owned = ctx
            .agent
            .accounts()
            .iter()
            .filter(|account| ctx.tracker.is_group(account))
            .count();
        if owned >= max {
            return false;
        }
    }
    true
}
