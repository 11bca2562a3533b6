//! In-process trust-token ledger.
//!
//! A small, deterministic stand-in for an RPC-connected hub contract. It
//! implements both [`ExecutionClient`] and [`ChainControl`]; clones share the
//! same ledger state, so one handle can be registered as a client while
//! another drives time.
//!
//! Semantics follow a personal-currency trust hub:
//!
//! - `registerHuman` registers the sender as a human avatar
//! - `trust` creates, extends or (with an expiry in the past) revokes trust
//! - `personalMint` issues one token per full hour since the last mint,
//!   capped at two weeks of issuance
//! - `safeTransferFrom` moves tokens if the receiver trusts the token's avatar
//! - `registerGroup` registers the sender as a group avatar
//!
//! Failure injection (unreachable backend, rejected methods, call latency)
//! exists so the engine's error paths can be exercised.

use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::types::{Address, Amount, Call, ChainHead, OperationRequest, Outcome, Query, ViewValue, ONE_TOKEN};
use super::{ChainControl, ClientError, ExecutionClient};
use crate::state::events::Event;

/// Default timestamp of the genesis block.
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

const SECONDS_PER_HOUR: u64 = 3_600;
const MAX_ISSUANCE_HOURS: u64 = 14 * 24;

/// Gas charged per method; a request whose gas limit is lower runs out of gas.
fn gas_cost(call: &Call) -> u64 {
    match call {
        Call::RegisterHuman { .. } => 200_000,
        Call::Trust { .. } => 60_000,
        Call::PersonalMint => 120_000,
        Call::SafeTransferFrom { .. } => 90_000,
        Call::RegisterGroup { .. } => 300_000,
    }
}

#[derive(Debug)]
struct LedgerState {
    head: ChainHead,
    nonce: u64,
    /// human -> end of last minted period
    humans: BTreeMap<Address, u64>,
    groups: BTreeSet<Address>,
    trust: BTreeMap<(Address, Address), u64>,
    balances: BTreeMap<(Address, Address), Amount>,
    reachable: bool,
    rejected_methods: HashSet<String>,
    latency: Duration,
    timeout: Duration,
}

impl LedgerState {
    fn is_avatar(&self, account: &Address) -> bool {
        self.humans.contains_key(account) || self.groups.contains(account)
    }

    fn next_tx_hash(&mut self) -> String {
        self.nonce += 1;
        format!("0x{:064x}", self.nonce)
    }

    fn execute(&mut self, request: &OperationRequest) -> Result<Vec<Event>, ClientError> {
        let now = self.head.timestamp;
        let sender = &request.sender;

        if request.gas_limit < gas_cost(&request.call) {
            return Err(ClientError::Rejected(format!(
                "out of gas: {} needs {}, limit {}",
                request.method(),
                gas_cost(&request.call),
                request.gas_limit
            )));
        }

        match &request.call {
            Call::RegisterHuman { inviter } => {
                if self.is_avatar(sender) {
                    return Err(ClientError::Rejected(format!("{} is already registered", sender)));
                }
                if let Some(inviter) = inviter {
                    if !self.humans.contains_key(inviter) {
                        return Err(ClientError::Rejected(format!("inviter {} is not a human", inviter)));
                    }
                }
                self.humans.insert(sender.clone(), now);
                Ok(vec![Event::RegisterHuman { avatar: sender.clone(), inviter: inviter.clone() }])
            }
            Call::Trust { trustee, expiry } => {
                if !self.is_avatar(sender) {
                    return Err(ClientError::Rejected(format!("truster {} is not registered", sender)));
                }
                if trustee == sender {
                    return Err(ClientError::Rejected("an avatar cannot trust itself".to_string()));
                }
                if !self.is_avatar(trustee) {
                    return Err(ClientError::Rejected(format!("trustee {} is not registered", trustee)));
                }
                let effective = (*expiry).max(now);
                self.trust.insert((sender.clone(), trustee.clone()), effective);
                Ok(vec![Event::Trust { truster: sender.clone(), trustee: trustee.clone(), expiry: effective }])
            }
            Call::PersonalMint => {
                let last = *self
                    .humans
                    .get(sender)
                    .ok_or_else(|| ClientError::Rejected(format!("{} is not a human", sender)))?;
                let hours = (now.saturating_sub(last) / SECONDS_PER_HOUR).min(MAX_ISSUANCE_HOURS);
                if hours == 0 {
                    return Err(ClientError::Rejected("no issuance available".to_string()));
                }
                let amount = Amount::from(hours) * ONE_TOKEN;
                let end_period = if now - last > MAX_ISSUANCE_HOURS * SECONDS_PER_HOUR {
                    now
                } else {
                    last + hours * SECONDS_PER_HOUR
                };
                self.humans.insert(sender.clone(), end_period);
                *self.balances.entry((sender.clone(), sender.clone())).or_insert(0) += amount;
                Ok(vec![
                    Event::TransferSingle {
                        operator: sender.clone(),
                        from: None,
                        to: sender.clone(),
                        token: sender.clone(),
                        value: amount,
                    },
                    Event::PersonalMint { human: sender.clone(), amount, end_period },
                ])
            }
            Call::SafeTransferFrom { to, token, amount } => {
                if *amount == 0 {
                    return Err(ClientError::Rejected("zero amount".to_string()));
                }
                let trusted = token == to
                    || self.trust.get(&(to.clone(), token.clone())).is_some_and(|expiry| *expiry > now);
                if !trusted {
                    return Err(ClientError::Rejected(format!("{} does not trust token {}", to, token)));
                }
                let balance = self.balances.get(&(sender.clone(), token.clone())).copied().unwrap_or(0);
                if balance < *amount {
                    return Err(ClientError::Rejected(format!("insufficient balance: {} < {}", balance, amount)));
                }
                self.balances.insert((sender.clone(), token.clone()), balance - amount);
                *self.balances.entry((to.clone(), token.clone())).or_insert(0) += amount;
                Ok(vec![Event::TransferSingle {
                    operator: sender.clone(),
                    from: Some(sender.clone()),
                    to: to.clone(),
                    token: token.clone(),
                    value: *amount,
                }])
            }
            Call::RegisterGroup { name, symbol } => {
                if self.is_avatar(sender) {
                    return Err(ClientError::Rejected(format!("{} is already registered", sender)));
                }
                if name.is_empty() || symbol.is_empty() {
                    return Err(ClientError::Rejected("group name and symbol are required".to_string()));
                }
                self.groups.insert(sender.clone());
                Ok(vec![Event::RegisterGroup {
                    group: sender.clone(),
                    creator: sender.clone(),
                    name: name.clone(),
                    symbol: symbol.clone(),
                }])
            }
        }
    }
}

/// Shared handle to an in-process ledger.
#[derive(Debug, Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Create a ledger at block 0 whose calls time out after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_genesis(GENESIS_TIMESTAMP, timeout)
    }

    pub fn with_genesis(timestamp: u64, timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                head: ChainHead { block: 0, timestamp },
                nonce: 0,
                humans: BTreeMap::new(),
                groups: BTreeSet::new(),
                trust: BTreeMap::new(),
                balances: BTreeMap::new(),
                reachable: true,
                rejected_methods: HashSet::new(),
                latency: Duration::ZERO,
                timeout,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, ClientError> {
        self.state
            .lock()
            .map_err(|_| ClientError::Unavailable("ledger state poisoned".to_string()))
    }

    /// Make the backend reachable or unreachable.
    pub fn set_reachable(&self, reachable: bool) -> Result<(), ClientError> {
        self.lock()?.reachable = reachable;
        Ok(())
    }

    /// Reject every future call to `method` (e.g. `"trust"`).
    pub fn reject_method(&self, method: &str) -> Result<(), ClientError> {
        self.lock()?.rejected_methods.insert(method.to_string());
        Ok(())
    }

    pub fn allow_method(&self, method: &str) -> Result<(), ClientError> {
        self.lock()?.rejected_methods.remove(method);
        Ok(())
    }

    /// Simulated per-call latency; calls slower than the timeout fail.
    pub fn set_latency(&self, latency: Duration) -> Result<(), ClientError> {
        self.lock()?.latency = latency;
        Ok(())
    }

    /// Number of transactions confirmed so far.
    pub fn confirmed_transactions(&self) -> Result<u64, ClientError> {
        Ok(self.lock()?.nonce)
    }
}

impl ExecutionClient for InMemoryLedger {
    fn call(&mut self, request: &OperationRequest) -> Result<Outcome, ClientError> {
        let mut state = self.lock()?;
        if !state.reachable {
            return Err(ClientError::Unavailable("ledger is unreachable".to_string()));
        }
        if state.latency > state.timeout {
            return Err(ClientError::Timeout(state.timeout));
        }
        if state.rejected_methods.contains(request.method()) {
            return Err(ClientError::Rejected(format!("{} is disabled", request.method())));
        }

        let events = state.execute(request)?;
        let tx_hash = state.next_tx_hash();
        let head = state.head;
        debug!("Confirmed {} from {} as {}", request.method(), request.sender, tx_hash);
        Ok(Outcome::confirmed(request, tx_hash, events, head))
    }

    fn view(&self, query: &Query) -> Result<ViewValue, ClientError> {
        let state = self.lock()?;
        if !state.reachable {
            return Err(ClientError::Unavailable("ledger is unreachable".to_string()));
        }
        let now = state.head.timestamp;
        Ok(match query {
            Query::IsHuman { account } => ViewValue::Bool(state.humans.contains_key(account)),
            Query::IsTrusted { truster, trustee } => ViewValue::Bool(
                state
                    .trust
                    .get(&(truster.clone(), trustee.clone()))
                    .is_some_and(|expiry| *expiry > now),
            ),
            Query::BalanceOf { account, token } => {
                ViewValue::Amount(state.balances.get(&(account.clone(), token.clone())).copied().unwrap_or(0))
            }
        })
    }
}

impl ChainControl for InMemoryLedger {
    fn mine(&mut self, blocks: u64, seconds_per_block: u64) -> Result<ChainHead, ClientError> {
        let mut state = self.lock()?;
        if !state.reachable {
            return Err(ClientError::Unavailable("ledger is unreachable".to_string()));
        }
        state.head.block += blocks;
        state.head.timestamp += blocks * seconds_per_block;
        Ok(state.head)
    }

    fn head(&self) -> Result<ChainHead, ClientError> {
        let state = self.lock()?;
        if !state.reachable {
            return Err(ClientError::Unavailable("ledger is unreachable".to_string()));
        }
        Ok(state.head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn request(sender: Address, call: Call) -> OperationRequest {
        OperationRequest {
            client: "ringshub".to_string(),
            action: "test".to_string(),
            agent: "honest-0000".to_string(),
            sender,
            call,
            gas_limit: 500_000,
            new_account: None,
        }
    }

    fn register(ledger: &mut InMemoryLedger, n: u8) {
        ledger.call(&request(addr(n), Call::RegisterHuman { inviter: None })).unwrap();
    }

    #[test]
    fn test_register_twice_is_rejected() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        register(&mut ledger, 1);
        let second = ledger.call(&request(addr(1), Call::RegisterHuman { inviter: None }));
        assert!(matches!(second, Err(ClientError::Rejected(_))));
    }

    #[test]
    fn test_mint_accrues_hourly() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        register(&mut ledger, 1);

        let early = ledger.call(&request(addr(1), Call::PersonalMint));
        assert!(matches!(early, Err(ClientError::Rejected(_))));

        ledger.mine(720, 5).unwrap(); // one hour
        let outcome = ledger.call(&request(addr(1), Call::PersonalMint)).unwrap();
        assert!(outcome.success);
        assert_eq!(
            ledger.view(&Query::BalanceOf { account: addr(1), token: addr(1) }).unwrap(),
            ViewValue::Amount(ONE_TOKEN)
        );
    }

    #[test]
    fn test_transfer_requires_receiver_trust() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        register(&mut ledger, 1);
        register(&mut ledger, 2);
        ledger.mine(720, 10).unwrap();
        ledger.call(&request(addr(1), Call::PersonalMint)).unwrap();

        let transfer = Call::SafeTransferFrom { to: addr(2), token: addr(1), amount: ONE_TOKEN };
        assert!(ledger.call(&request(addr(1), transfer.clone())).is_err());

        let head = ledger.head().unwrap();
        ledger
            .call(&request(addr(2), Call::Trust { trustee: addr(1), expiry: head.timestamp + 1_000 }))
            .unwrap();
        assert!(ledger.call(&request(addr(1), transfer)).unwrap().success);
    }

    #[test]
    fn test_unreachable_ledger_is_run_stopping() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        ledger.set_reachable(false).unwrap();
        let err = ledger.mine(1, 5).unwrap_err();
        assert!(err.is_run_stopping());
        let err = ledger.call(&request(addr(1), Call::PersonalMint)).unwrap_err();
        assert!(err.is_run_stopping());
    }

    #[test]
    fn test_slow_calls_time_out() {
        let mut ledger = InMemoryLedger::new(Duration::from_millis(10));
        ledger.set_latency(Duration::from_millis(50)).unwrap();
        let err = ledger.call(&request(addr(1), Call::RegisterHuman { inviter: None })).unwrap_err();
        assert_eq!(err, ClientError::Timeout(Duration::from_millis(10)));
        assert!(!err.is_run_stopping());
    }

    #[test]
    fn test_low_gas_limit_runs_out_of_gas() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        let mut low = request(addr(1), Call::RegisterHuman { inviter: None });
        low.gas_limit = 1_000;
        assert!(matches!(ledger.call(&low), Err(ClientError::Rejected(_))));
    }

    #[test]
    fn test_rejected_method_can_be_allowed_again() {
        let mut ledger = InMemoryLedger::new(Duration::from_secs(30));
        ledger.reject_method("registerHuman").unwrap();
        let rejected = ledger.call(&request(addr(1), Call::RegisterHuman { inviter: None }));
        assert!(matches!(rejected, Err(ClientError::Rejected(_))));
        assert_eq!(ledger.confirmed_transactions().unwrap(), 0);

        ledger.allow_method("registerHuman").unwrap();
        register(&mut ledger, 1);
        register(&mut ledger, 2);
        assert_eq!(ledger.confirmed_transactions().unwrap(), 2);
    }
}
