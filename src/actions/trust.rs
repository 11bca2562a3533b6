//! Trust formation and revocation.
//!
//! Trust is an expiring edge. Revoking is a trust call whose expiry is the
//! current time, which makes the edge inactive immediately.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{ActionContext, ResolvedCall};
use crate::client::types::{Address, Call};

const SECONDS_PER_DAY: u64 = 86_400;

/// Trust lifetime when the action does not configure one.
pub const DEFAULT_TRUST_DURATION_DAYS: u64 = 365;

pub fn can_trust(ctx: &ActionContext<'_>, primary: &Address) -> bool {
    ctx.tracker.is_registered(primary)
}

pub fn can_untrust(ctx: &ActionContext<'_>, primary: &Address) -> bool {
    !ctx.tracker.outgoing_active_trust(primary, ctx.now()).is_empty()
}

/// Pick a registered avatar the agent does not trust yet.
pub fn resolve_trust<R: Rng + ?Sized>(
    ctx: &ActionContext<'_>,
    primary: &Address,
    rng: &mut R,
) -> Option<ResolvedCall> {
    let now = ctx.now();
    let candidates: Vec<&Address> = ctx
        .tracker
        .avatars()
        .filter(|avatar| *avatar != primary && !ctx.agent.owns(avatar))
        .filter(|avatar| !ctx.tracker.active_trust(primary, avatar, now))
        .collect();
    let trustee = (*candidates.choose(rng)?).clone();

    let days = ctx
        .config
        .constraints
        .trust_duration_days
        .unwrap_or(DEFAULT_TRUST_DURATION_DAYS);
    let expiry = now.saturating_add(days.saturating_mul(SECONDS_PER_DAY));
    Some(ResolvedCall::from_sender(primary, Call::Trust { trustee, expiry }))
}

/// Pick one actively trusted avatar and revoke the edge.
pub fn resolve_untrust<R: Rng + ?Sized>(
    ctx: &ActionContext<'_>,
    primary: &Address,
    rng: &mut R,
) -> Option<ResolvedCall> {
    let now = ctx.now();
    let trusted = ctx.tracker.outgoing_active_trust(primary, now);
    let trustee = trusted.choose(rng)?.clone();
    Some(ResolvedCall::from_sender(primary, Call::Trust { trustee, expiry: now }))
}
