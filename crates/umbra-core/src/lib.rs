//! # umbra-core
//! Protocol core for Umbra: foundation types, the dual transaction
//! representation, block hashing, the ElGamal confidential-balance
//! primitive, the fee schedule, and the shared mempool engine.

pub mod block;
pub mod codec;
pub mod constants;
pub mod crypto;
pub mod elgamal;
pub mod error;
pub mod fees;
pub mod mempool;
pub mod traits;
pub mod transaction;
pub mod types;
