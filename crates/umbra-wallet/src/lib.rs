//! # umbra-wallet
//! Wallet-side machinery: deterministic key derivation from a master
//! seed, the transaction wizard (construction, fee fixed point, signing),
//! and the builder that binds the wizard to a pool and chain view.

pub mod builder;
pub mod error;
pub mod keys;
pub mod wizard;

pub use builder::TransactionsBuilder;
pub use error::{WalletError, WizardError};
pub use keys::{Seed, WalletAddress};
