//! Events emitted by confirmed operations.

use serde::{Deserialize, Serialize};

use crate::client::types::{Address, Amount};

/// Ledger event carried by a confirmed outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum Event {
    RegisterHuman {
        avatar: Address,
        inviter: Option<Address>,
    },
    RegisterGroup {
        group: Address,
        creator: Address,
        name: String,
        symbol: String,
    },
    Trust {
        truster: Address,
        trustee: Address,
        expiry: u64,
    },
    /// Single-token balance movement; `from` is `None` for mints.
    TransferSingle {
        operator: Address,
        from: Option<Address>,
        to: Address,
        token: Address,
        value: Amount,
    },
    PersonalMint {
        human: Address,
        amount: Amount,
        end_period: u64,
    },
}

impl Event {
    /// Event name as recorded by collectors
    pub fn name(&self) -> &'static str {
        match self {
            Event::RegisterHuman { .. } => "RegisterHuman",
            Event::RegisterGroup { .. } => "RegisterGroup",
            Event::Trust { .. } => "Trust",
            Event::TransferSingle { .. } => "TransferSingle",
            Event::PersonalMint { .. } => "PersonalMint",
        }
    }
}
