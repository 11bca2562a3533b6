//! # Ringsim - Agent-based simulation of trust-based token networks
//!
//! This library drives a population of synthetic participants against a
//! ledger of personal currencies linked by trust relationships.
//!
//! ## Overview
//!
//! Every iteration, the engine advances simulated time on the backend, lets
//! each agent pick actions from its profile (subject to probability,
//! cooldown and data-dependent constraints), submits the resulting
//! operations in batches, and reconciles its local view of the ledger from
//! the outcomes. Runs are reproducible from a single seed.
//!
//! ## Key Features
//!
//! - **Profiles**: per-action probability, cooldown, gas ceiling, balance
//!   bounds and typed constraints
//! - **Action Registry**: built-in trust-hub actions plus manifest discovery
//! - **Batching**: independent execution clients are called in parallel,
//!   reconciliation stays in request order
//! - **State Tracker**: idempotent mirror of balances, trust edges and
//!   registrations
//! - **Collectors**: in-memory and JSON-lines run records
//!
//! ## Architecture
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and CLI overrides
//! - `client`: Execution client and chain control traits, in-memory ledger
//! - `state`: Ledger events and the balance/state tracker
//! - `agent`: Profiles, agents and population management
//! - `actions`: Eligibility predicates and parameter resolvers
//! - `registry`: Named action catalog and manifest discovery
//! - `engine`: Dispatcher, network builder and network evolver
//! - `collector`: Run data sinks
//! - `orchestrator`: One complete run from build to summary
//! - `utils`: Duration parsing and validation helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use ringsim::client::{ClientSet, InMemoryLedger};
//! use ringsim::collector::NullCollector;
//! use ringsim::orchestrator::Simulation;
//! use ringsim::registry::ActionRegistry;
//! use std::path::Path;
//!
//! let config = ringsim::config_loader::load_config(Path::new("network.yaml"), Path::new("agents.yaml"))?;
//! let ledger = InMemoryLedger::new(config.network.call_timeout);
//! let clients = ClientSet::new().with_client("ringshub", Box::new(ledger.clone()));
//!
//! let mut simulation = Simulation::new(
//!     config,
//!     ActionRegistry::builtin(),
//!     clients,
//!     Box::new(ledger),
//!     Box::new(NullCollector),
//! )?;
//! let summary = simulation.run()?;
//! println!("{}/{} actions succeeded", summary.successful_actions, summary.total_actions);
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Each module reports its own `thiserror` error type. The loader, the
//! orchestrator and the binary use `color_eyre` for error reports with
//! context.

pub mod actions;
pub mod agent;
pub mod client;
pub mod collector;
pub mod config;
pub mod config_loader;
pub mod engine;
pub mod orchestrator;
pub mod registry;
pub mod state;
pub mod utils;
