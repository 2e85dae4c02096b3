//! Error types for wallet-side transaction construction.
use thiserror::Error;

use umbra_core::error::{CryptoError, MempoolError, TransactionError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    #[error("fee failed to stabilize after {0} iterations")] FeeFixedPointDivergence(u32),
    #[error("no input carries the fee asset")] NoFeeInput,
    #[error("transparent fees must be paid in the native asset")] NonNativeFee,
    #[error("fee-in-extra is only supported for unstake transactions")] FeeExtraUnsupported,
    #[error("no published fee rate for the fee asset")] NoPublishedRate,
    #[error("input lengths are mismatched")] InputMismatch,
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Crypto(#[from] CryptoError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("account does not exist on chain")] AccountNotFound,
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: u64, need: u64 },
    #[error("insufficient staked funds: have {have}, need {need}")] InsufficientStake { have: u64, need: u64 },
    #[error("a pending {0} already exists for this account")] DuplicateInFlight(&'static str),
    #[error(transparent)] Wizard(#[from] WizardError),
    #[error(transparent)] Mempool(#[from] MempoolError),
}
