//! Group registration.
//!
//! A group is registered from a fresh account. The agent takes ownership of
//! that account once the registration is confirmed.

use rand::Rng;

use super::{ActionContext, ResolvedCall};
use crate::client::types::{Address, Call};

/// Only humans create groups.
pub fn can_register_group(ctx: &ActionContext<'_>, primary: &Address) -> bool {
    ctx.tracker.is_human(primary)
}

pub fn resolve_register_group<R: Rng + ?Sized>(ctx: &ActionContext<'_>, rng: &mut R) -> ResolvedCall {
    let group = Address::random(rng);
    let serial = ctx
        .agent
        .accounts()
        .iter()
        .filter(|account| ctx.tracker.is_group(account))
        .count()
        + 1;
    let tag = group.short()[2..].to_uppercase();

    ResolvedCall {
        sender: group.clone(),
        call: Call::RegisterGroup {
            name: format!("RingsGroup{}{}", tag, serial),
            symbol: format!("RG{}{}", tag, serial),
        },
        new_account: Some(group),
    }
}
