//! Human registration and personal issuance.

use super::{ActionContext, ResolvedCall};
use crate::client::types::{Address, Call};

/// Issuance accrues per full hour.
pub const MINT_INTERVAL_SECS: u64 = 3_600;

pub fn can_register(ctx: &ActionContext<'_>, primary: &Address) -> bool {
    !ctx.tracker.is_registered(primary)
}

/// A human can mint once a full hour has passed since its last minted period.
pub fn can_mint(ctx: &ActionContext<'_>, primary: &Address) -> bool {
    ctx.tracker.is_human(primary)
        && ctx
            .tracker
            .last_mint(primary)
            .is_some_and(|last| ctx.now().saturating_sub(last) >= MINT_INTERVAL_SECS)
}

pub fn resolve_register(primary: &Address) -> ResolvedCall {
    ResolvedCall::from_sender(primary, Call::RegisterHuman { inviter: None })
}

pub fn resolve_mint(primary: &Address) -> ResolvedCall {
    ResolvedCall::from_sender(primary, Call::PersonalMint)
}
