//! Error types for node-side block processing and configuration.
use thiserror::Error;

use umbra_core::error::{BlockError, CryptoError, MempoolError, TransactionError};

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("block parent {got} does not match chain tip {expected}")] UnknownParent { expected: String, got: String },
    #[error("block height {got}, expected {expected}")] BadHeight { expected: u64, got: u64 },
    #[error("merkle hash does not commit to the included transactions")] MerkleMismatch,
    #[error("account {0} cannot cover a confirmed debit")] Underfunded(String),
    #[error("configuration: {0}")] Config(#[from] config::ConfigError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Mempool(#[from] MempoolError),
    #[error("io: {0}")] Io(#[from] std::io::Error),
}
