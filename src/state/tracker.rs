//! Balance and trust tracker.
//!
//! Maintains the network snapshot from the stream of confirmed outcomes:
//!
//! - balances keyed by (account, token)
//! - trust edges keyed by (truster, trustee) with an expiry timestamp
//! - human and group registrations
//! - the end of the last minted period per human
//!
//! All maps are ordered so that resolvers iterating them stay reproducible
//! for a given seed.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::client::types::{Address, Amount, Outcome, TxHash};
use crate::state::events::Event;

/// Registered group metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub creator: Address,
    pub name: String,
    pub symbol: String,
}

/// Local mirror of the ledger, updated only from confirmed outcomes.
#[derive(Debug, Clone, Default)]
pub struct BalanceTracker {
    /// account -> token -> amount
    balances: BTreeMap<Address, BTreeMap<Address, Amount>>,
    /// truster -> trustee -> expiry
    trust: BTreeMap<Address, BTreeMap<Address, u64>>,
    humans: BTreeSet<Address>,
    groups: BTreeMap<Address, GroupInfo>,
    last_mint: BTreeMap<Address, u64>,
    applied: HashSet<TxHash>,
}

impl BalanceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a confirmed outcome.
    ///
    /// Returns `true` if the outcome changed the snapshot. Failed outcomes,
    /// outcomes without a transaction hash and outcomes whose hash was
    /// already applied are ignored.
    pub fn apply(&mut self, outcome: &Outcome) -> bool {
        if !outcome.success {
            return false;
        }
        match &outcome.tx_hash {
            Some(hash) => {
                if !self.applied.insert(hash.clone()) {
                    debug!("Skipping replayed outcome {}", hash);
                    return false;
                }
            }
            None => {
                warn!(
                    "Ignoring confirmed {} outcome from '{}' without a transaction hash",
                    outcome.method, outcome.client
                );
                return false;
            }
        }

        for event in &outcome.events {
            self.apply_event(event, outcome.timestamp);
        }
        true
    }

    fn apply_event(&mut self, event: &Event, timestamp: u64) {
        match event {
            Event::RegisterHuman { avatar, .. } => {
                self.humans.insert(avatar.clone());
                // Issuance accrues from the moment of registration.
                self.last_mint.entry(avatar.clone()).or_insert(timestamp);
            }
            Event::RegisterGroup { group, creator, name, symbol } => {
                self.groups.insert(
                    group.clone(),
                    GroupInfo {
                        creator: creator.clone(),
                        name: name.clone(),
                        symbol: symbol.clone(),
                    },
                );
            }
            Event::Trust { truster, trustee, expiry } => {
                self.trust
                    .entry(truster.clone())
                    .or_default()
                    .insert(trustee.clone(), *expiry);
            }
            Event::TransferSingle { from, to, token, value, .. } => {
                if let Some(from) = from {
                    let slot = self
                        .balances
                        .entry(from.clone())
                        .or_default()
                        .entry(token.clone())
                        .or_insert(0);
                    if *slot < *value {
                        warn!("Transfer of {} {} from {} exceeds tracked balance {}", value, token, from, slot);
                    }
                    *slot = slot.saturating_sub(*value);
                }
                *self
                    .balances
                    .entry(to.clone())
                    .or_default()
                    .entry(token.clone())
                    .or_insert(0) += *value;
            }
            Event::PersonalMint { human, end_period, .. } => {
                self.last_mint.insert(human.clone(), *end_period);
            }
        }
    }

    /// Balance of `token` held by `account`; zero for unseen keys.
    pub fn balance_of(&self, account: &Address, token: &Address) -> Amount {
        self.balances
            .get(account)
            .and_then(|tokens| tokens.get(token))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of all token balances held by `account`
    pub fn total_balance(&self, account: &Address) -> Amount {
        self.balances
            .get(account)
            .map(|tokens| tokens.values().sum())
            .unwrap_or(0)
    }

    /// Non-zero token holdings of `account`, ordered by token.
    pub fn holdings(&self, account: &Address) -> Vec<(Address, Amount)> {
        self.balances
            .get(account)
            .map(|tokens| {
                tokens
                    .iter()
                    .filter(|(_, amount)| **amount > 0)
                    .map(|(token, amount)| (token.clone(), *amount))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `truster` trusts `trustee` at `at_time`.
    ///
    /// An edge whose expiry is at or before `at_time` is inactive.
    pub fn active_trust(&self, truster: &Address, trustee: &Address, at_time: u64) -> bool {
        self.trust
            .get(truster)
            .and_then(|edges| edges.get(trustee))
            .is_some_and(|expiry| *expiry > at_time)
    }

    /// Active outgoing trust edges of `truster`, excluding self-trust.
    pub fn outgoing_active_trust(&self, truster: &Address, at_time: u64) -> Vec<Address> {
        self.trust
            .get(truster)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(trustee, expiry)| **expiry > at_time && *trustee != truster)
                    .map(|(trustee, _)| trustee.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Accounts that actively trust `trustee`, excluding `trustee` itself.
    pub fn trusters_of(&self, trustee: &Address, at_time: u64) -> Vec<Address> {
        self.trust
            .iter()
            .filter(|(truster, edges)| {
                *truster != trustee && edges.get(trustee).is_some_and(|expiry| *expiry > at_time)
            })
            .map(|(truster, _)| truster.clone())
            .collect()
    }

    pub fn trusted_by_count(&self, trustee: &Address, at_time: u64) -> usize {
        self.trusters_of(trustee, at_time).len()
    }

    /// Number of active trust edges in the snapshot.
    pub fn active_trust_edges(&self, at_time: u64) -> usize {
        self.trust
            .iter()
            .map(|(truster, edges)| {
                edges
                    .iter()
                    .filter(|(trustee, expiry)| **expiry > at_time && *trustee != truster)
                    .count()
            })
            .sum()
    }

    pub fn is_human(&self, account: &Address) -> bool {
        self.humans.contains(account)
    }

    pub fn is_group(&self, account: &Address) -> bool {
        self.groups.contains_key(account)
    }

    /// Registered as either a human or a group
    pub fn is_registered(&self, account: &Address) -> bool {
        self.is_human(account) || self.is_group(account)
    }

    /// Registered humans followed by registered groups, each in address order.
    pub fn avatars(&self) -> impl Iterator<Item = &Address> {
        self.humans.iter().chain(self.groups.keys())
    }

    pub fn group(&self, account: &Address) -> Option<&GroupInfo> {
        self.groups.get(account)
    }

    /// End of the last minted period (or registration time) of a human.
    pub fn last_mint(&self, human: &Address) -> Option<u64> {
        self.last_mint.get(human).copied()
    }

    pub fn human_count(&self) -> usize {
        self.humans.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of distinct outcomes applied so far.
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::{Call, ChainHead, OperationRequest, ONE_TOKEN};

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{:040x}", n)).unwrap()
    }

    fn outcome(hash: &str, events: Vec<Event>, timestamp: u64) -> Outcome {
        let request = OperationRequest {
            client: "ringshub".to_string(),
            action: "ringshub_Trust".to_string(),
            agent: "honest-0000".to_string(),
            sender: addr(1),
            call: Call::PersonalMint,
            gas_limit: 500_000,
            new_account: None,
        };
        Outcome::confirmed(&request, hash.to_string(), events, ChainHead { block: 1, timestamp })
    }

    #[test]
    fn test_unseen_balance_defaults_to_zero() {
        let tracker = BalanceTracker::new();
        assert_eq!(tracker.balance_of(&addr(1), &addr(2)), 0);
        assert_eq!(tracker.total_balance(&addr(1)), 0);
    }

    #[test]
    fn test_trust_edge_expires() {
        let mut tracker = BalanceTracker::new();
        let event = Event::Trust { truster: addr(1), trustee: addr(2), expiry: 100 };
        assert!(tracker.apply(&outcome("0x01", vec![event], 10)));

        assert!(tracker.active_trust(&addr(1), &addr(2), 99));
        assert!(!tracker.active_trust(&addr(1), &addr(2), 100));
        assert!(!tracker.active_trust(&addr(2), &addr(1), 50));
        assert_eq!(tracker.trusters_of(&addr(2), 50), vec![addr(1)]);
        assert!(tracker.trusters_of(&addr(2), 150).is_empty());
    }

    #[test]
    fn test_replayed_outcome_is_ignored() {
        let mut tracker = BalanceTracker::new();
        let mint = outcome(
            "0xaa",
            vec![Event::TransferSingle {
                operator: addr(1),
                from: None,
                to: addr(1),
                token: addr(1),
                value: 5 * ONE_TOKEN,
            }],
            10,
        );

        assert!(tracker.apply(&mint));
        assert!(!tracker.apply(&mint));
        assert_eq!(tracker.balance_of(&addr(1), &addr(1)), 5 * ONE_TOKEN);
        assert_eq!(tracker.applied_count(), 1);
    }

    #[test]
    fn test_failed_outcome_changes_nothing() {
        let mut tracker = BalanceTracker::new();
        let mut failed = outcome("0xbb", vec![Event::RegisterHuman { avatar: addr(3), inviter: None }], 10);
        failed.success = false;

        assert!(!tracker.apply(&failed));
        assert!(!tracker.is_human(&addr(3)));
    }

    #[test]
    fn test_transfer_moves_balance() {
        let mut tracker = BalanceTracker::new();
        tracker.apply(&outcome(
            "0x01",
            vec![Event::TransferSingle { operator: addr(1), from: None, to: addr(1), token: addr(1), value: 10 }],
            10,
        ));
        tracker.apply(&outcome(
            "0x02",
            vec![Event::TransferSingle { operator: addr(1), from: Some(addr(1)), to: addr(2), token: addr(1), value: 4 }],
            20,
        ));

        assert_eq!(tracker.balance_of(&addr(1), &addr(1)), 6);
        assert_eq!(tracker.balance_of(&addr(2), &addr(1)), 4);
        assert_eq!(tracker.holdings(&addr(2)), vec![(addr(1), 4)]);
    }

    #[test]
    fn test_registration_starts_issuance_clock() {
        let mut tracker = BalanceTracker::new();
        tracker.apply(&outcome("0x01", vec![Event::RegisterHuman { avatar: addr(4), inviter: None }], 1_000));
        assert!(tracker.is_human(&addr(4)));
        assert_eq!(tracker.last_mint(&addr(4)), Some(1_000));

        tracker.apply(&outcome(
            "0x02",
            vec![Event::PersonalMint { human: addr(4), amount: ONE_TOKEN, end_period: 4_600 }],
            5_000,
        ));
        assert_eq!(tracker.last_mint(&addr(4)), Some(4_600));
    }

    #[test]
    fn test_replayed_trust_does_not_undo_revocation() {
        let mut tracker = BalanceTracker::new();
        let trust = outcome("0x01", vec![Event::Trust { truster: addr(1), trustee: addr(2), expiry: u64::MAX }], 10);
        let revoke = outcome("0x02", vec![Event::Trust { truster: addr(1), trustee: addr(2), expiry: 20 }], 20);

        assert!(tracker.apply(&trust));
        assert!(tracker.apply(&revoke));
        assert!(!tracker.apply(&trust));

        assert!(!tracker.active_trust(&addr(1), &addr(2), 20));
        assert!(tracker.outgoing_active_trust(&addr(1), 20).is_empty());
        assert_eq!(tracker.active_trust_edges(20), 0);
    }

    #[test]
    fn test_confirmed_outcome_without_hash_is_refused() {
        let mut tracker = BalanceTracker::new();
        let mut registration = outcome("0x01", vec![Event::RegisterHuman { avatar: addr(5), inviter: None }], 10);
        registration.tx_hash = None;

        assert!(!tracker.apply(&registration));
        assert!(!tracker.is_human(&addr(5)));
        assert_eq!(tracker.applied_count(), 0);
    }

    #[test]
    fn test_group_registration_is_tracked() {
        let mut tracker = BalanceTracker::new();
        let event = Event::RegisterGroup {
            group: addr(9),
            creator: addr(1),
            name: "Commons".to_string(),
            symbol: "COM".to_string(),
        };
        tracker.apply(&outcome("0x01", vec![event], 10));

        assert_eq!(tracker.group_count(), 1);
        assert!(tracker.is_registered(&addr(9)));
        let group = tracker.group(&addr(9)).unwrap();
        assert_eq!(group.creator, addr(1));
        assert_eq!(group.symbol, "COM");
        assert!(tracker.group(&addr(1)).is_none());
    }

    /// One generated ledger operation: 0 mints, 1 trusts, 2 revokes.
    fn generated_event(kind: u8, a: u8, b: u8, value: u128) -> Event {
        match kind {
            0 => Event::TransferSingle {
                operator: addr(a),
                from: None,
                to: addr(b),
                token: addr(a),
                value,
            },
            1 => Event::Trust { truster: addr(a), trustee: addr(b), expiry: u64::MAX },
            _ => Event::Trust { truster: addr(a), trustee: addr(b), expiry: 10 },
        }
    }

    proptest::proptest! {
        #[test]
        fn prop_replaying_outcomes_is_idempotent(
            ops in proptest::collection::vec((0u8..3, 1u8..=4, 1u8..=4, 1u128..1_000), 1..30)
        ) {
            let outcomes: Vec<Outcome> = ops
                .iter()
                .enumerate()
                .map(|(i, (kind, a, b, value))| {
                    outcome(&format!("0x{:02x}", i), vec![generated_event(*kind, *a, *b, *value)], 10)
                })
                .collect();

            let mut once = BalanceTracker::new();
            let mut twice = BalanceTracker::new();
            for outcome in &outcomes {
                once.apply(outcome);
                twice.apply(outcome);
            }
            // Replaying in reverse puts every trust after the revocation that followed it.
            for outcome in outcomes.iter().rev() {
                proptest::prop_assert!(!twice.apply(outcome));
            }

            for n in 1..=4u8 {
                proptest::prop_assert_eq!(once.holdings(&addr(n)), twice.holdings(&addr(n)));
                proptest::prop_assert_eq!(once.outgoing_active_trust(&addr(n), 10), twice.outgoing_active_trust(&addr(n), 10));
            }
            proptest::prop_assert_eq!(once.active_trust_edges(10), twice.active_trust_edges(10));
            proptest::prop_assert_eq!(once.applied_count(), twice.applied_count());
        }
    }
}
