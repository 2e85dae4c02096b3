//! # umbra-node-lib
//! Full node composition for Umbra: the in-memory chain store and its
//! read-only adapter, node configuration, the proof-of-stake forging
//! loop, and the [`Node`] that wires them to the transaction pool.

pub mod chain;
pub mod config;
pub mod error;
pub mod forger;
pub mod node;

pub use chain::{ChainStore, NodeChainState};
pub use config::NodeConfig;
pub use error::NodeError;
pub use forger::{ForgedBlock, Forger};
pub use node::Node;
