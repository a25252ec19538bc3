//! Ceres Farm Console
//!
//! A console client for the Ceres proof-of-capacity network. It drives the
//! native node/farmer backend, watches the chain for blocks farmed by the
//! locally configured reward address, keeps a persisted reward ledger, and
//! publishes typed events for a presentation layer to observe.
//!
//! # Architecture
//!
//! The core is the [`tracker::FarmTracker`]: a single long-lived subscription
//! to new block headers over the node's WebSocket RPC. Each header is
//! resolved to a full block, its pre-runtime producer digest is decoded, and
//! blocks farmed to the configured reward address are recorded with their
//! reward amount. Everything else - configuration, backend control, identity
//! generation - is supporting glue around that loop.
//!
//! # Trust model
//!
//! The reward mnemonic is generated and held locally, never persisted, and
//! zeroized once the user has confirmed it. The node is only trusted to
//! report chain data; all farm detection happens in this process.

pub mod backend;
pub mod chain;
pub mod config;
pub mod digest;
pub mod error;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod tracker;

pub mod commands;

pub use backend::NodeBackend;
pub use chain::{ChainConnection, ChainSource};
pub use config::{ConfigStore, ConsoleConfig};
pub use error::Error;
pub use events::{EventBus, FarmEvent};
pub use identity::RewardIdentity;
pub use ledger::{BlockLedger, FarmedBlock};
pub use tracker::{FarmTracker, TrackerState};
