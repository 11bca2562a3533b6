//! Wire-level types exchanged with execution clients.
//!
//! Requests are built by the action resolvers and never mutated afterwards;
//! outcomes are produced by a client (or synthesised for transport
//! failures) and are terminal.

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

use crate::state::events::Event;

/// Token amounts in base units (18 decimals).
pub type Amount = u128;

/// One whole token in base units.
pub const ONE_TOKEN: Amount = 1_000_000_000_000_000_000;

/// Transaction hash identifying a confirmed outcome.
pub type TxHash = String;

static ADDRESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").unwrap());

/// Address-like account identifier (`0x` followed by 40 hex digits, lowercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

/// Error returned when parsing a malformed address
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid address '{0}': expected 0x followed by 40 hex digits")]
pub struct AddressError(pub String);

impl Address {
    /// Parse and normalise an address string.
    pub fn parse(value: &str) -> Result<Self, AddressError> {
        let trimmed = value.trim();
        if !ADDRESS_PATTERN.is_match(trimmed) {
            return Err(AddressError(value.to_string()));
        }
        Ok(Address(trimmed.to_lowercase()))
    }

    /// The zero address, used as "no inviter" and as the mint source.
    pub fn zero() -> Self {
        Address(format!("0x{}", "0".repeat(40)))
    }

    /// Derive a fresh address from the simulation's random source.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let bytes: [u8; 20] = rng.gen();
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Address(format!("0x{}", hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form used in generated group names (`0xabcd`).
    pub fn short(&self) -> &str {
        &self.0[..6]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// Current head of the simulated chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainHead {
    pub block: u64,
    pub timestamp: u64,
}

/// Concrete, typed parameters of a state-mutating call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Call {
    RegisterHuman {
        inviter: Option<Address>,
    },
    /// Trust with an expiry; an expiry at or before the current time revokes.
    Trust {
        trustee: Address,
        expiry: u64,
    },
    PersonalMint,
    SafeTransferFrom {
        to: Address,
        token: Address,
        amount: Amount,
    },
    RegisterGroup {
        name: String,
        symbol: String,
    },
}

impl Call {
    /// Contract method name for this call
    pub fn method(&self) -> &'static str {
        match self {
            Call::RegisterHuman { .. } => "registerHuman",
            Call::Trust { .. } => "trust",
            Call::PersonalMint => "personalMint",
            Call::SafeTransferFrom { .. } => "safeTransferFrom",
            Call::RegisterGroup { .. } => "registerGroup",
        }
    }
}

/// A fully resolved operation ready for submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRequest {
    /// Execution client that serves the call.
    pub client: String,
    /// Registered action name the request was resolved from.
    pub action: String,
    /// Agent on whose behalf the call is made.
    pub agent: String,
    pub sender: Address,
    pub call: Call,
    pub gas_limit: u64,
    /// Account the agent takes ownership of once the call is confirmed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_account: Option<Address>,
}

impl OperationRequest {
    pub fn method(&self) -> &'static str {
        self.call.method()
    }
}

/// Terminal result of one submitted request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Identity of the confirmed transaction; absent when nothing was confirmed.
    pub tx_hash: Option<TxHash>,
    pub client: String,
    pub action: String,
    pub method: String,
    pub sender: Address,
    pub success: bool,
    pub events: Vec<Event>,
    pub error: Option<String>,
    pub block: u64,
    pub timestamp: u64,
}

impl Outcome {
    /// Confirmed outcome for `request`.
    pub fn confirmed(request: &OperationRequest, tx_hash: TxHash, events: Vec<Event>, head: ChainHead) -> Self {
        Self {
            tx_hash: Some(tx_hash),
            client: request.client.clone(),
            action: request.action.clone(),
            method: request.method().to_string(),
            sender: request.sender.clone(),
            success: true,
            events,
            error: None,
            block: head.block,
            timestamp: head.timestamp,
        }
    }

    /// Failed outcome for `request`; carries no events.
    pub fn failed(request: &OperationRequest, error: impl Into<String>, head: ChainHead) -> Self {
        Self {
            tx_hash: None,
            client: request.client.clone(),
            action: request.action.clone(),
            method: request.method().to_string(),
            sender: request.sender.clone(),
            success: false,
            events: Vec::new(),
            error: Some(error.into()),
            block: head.block,
            timestamp: head.timestamp,
        }
    }
}

/// Read-only queries supported by `ExecutionClient::view`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum Query {
    IsHuman { account: Address },
    IsTrusted { truster: Address, trustee: Address },
    BalanceOf { account: Address, token: Address },
}

/// Value returned from a view call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ViewValue {
    Bool(bool),
    Amount(Amount),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_address_parse_normalises_case() {
        let parsed = Address::parse("0xABCDEFabcdef0123456789012345678901234567").unwrap();
        assert_eq!(parsed.as_str(), "0xabcdefabcdef0123456789012345678901234567");
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("abcdefabcdef0123456789012345678901234567").is_err());
    }

    #[test]
    fn test_random_addresses_are_reproducible() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        let first = Address::random(&mut a);
        assert_eq!(first, Address::random(&mut b));
        assert!(Address::parse(first.as_str()).is_ok());
        assert_ne!(first, Address::random(&mut a));
    }

    #[test]
    fn test_call_serializes_with_method_tag() {
        let call = Call::Trust { trustee: Address::zero(), expiry: 10 };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["method"], "trust");
        assert_eq!(call.method(), "trust");
    }
}
