//! Local mirror of ledger state.
//!
//! The tracker is the only writer of the network snapshot. It is fed with
//! confirmed outcomes after each batch and is read by the eligibility
//! checks and parameter resolvers.

pub mod events;
pub mod tracker;

pub use events::Event;
pub use tracker::{BalanceTracker, GroupInfo};
