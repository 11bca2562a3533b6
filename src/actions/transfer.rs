//! Token transfers.
//!
//! A transfer moves part of one holding to an account that actively trusts
//! the token's avatar. The amount is drawn uniformly from `1..=cap`, where
//! the cap is the held balance limited by the action's `max_value`.

use rand::seq::SliceRandom;
use rand::Rng;

use super::{ActionContext, ResolvedCall};
use crate::client::types::{Address, Amount, Call};

struct Candidate {
    sender: Address,
    token: Address,
    balance: Amount,
    recipients: Vec<Address>,
}

fn candidates(ctx: &ActionContext<'_>) -> Vec<Candidate> {
    let now = ctx.now();
    let mut found = Vec::new();
    for account in ctx.agent.accounts() {
        for (token, balance) in ctx.tracker.holdings(account) {
            let recipients: Vec<Address> = ctx
                .tracker
                .trusters_of(&token, now)
                .into_iter()
                .filter(|recipient| recipient != account)
                .collect();
            if !recipients.is_empty() {
                found.push(Candidate { sender: account.clone(), token, balance, recipients });
            }
        }
    }
    found
}

/// At least one account holds tokens.
pub fn can_transfer(ctx: &ActionContext<'_>) -> bool {
    ctx.agent
        .accounts()
        .iter()
        .any(|account| ctx.tracker.total_balance(account) > 0)
}

pub fn resolve_transfer<R: Rng + ?Sized>(ctx: &ActionContext<'_>, rng: &mut R) -> Option<ResolvedCall> {
    let candidates = candidates(ctx);
    let candidate = candidates.choose(rng)?;
    let to = candidate.recipients.choose(rng)?.clone();

    let cap = ctx
        .config
        .max_value
        .map_or(candidate.balance, |max| max.min(candidate.balance));
    if cap == 0 {
        return None;
    }
    let amount = rng.gen_range(1..=cap);

    Some(ResolvedCall::from_sender(
        &candidate.sender,
        Call::SafeTransferFrom { to, token: candidate.token.clone(), amount },
    ))
}
