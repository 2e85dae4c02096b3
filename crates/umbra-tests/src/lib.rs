//! Cross-crate integration test suite for Umbra.
//!
//! The tests in `tests/` drive the full stack: wallet-built transactions
//! flowing through the pool, balance projections over both balance
//! representations, candidate selection, and block connection on a node.

pub mod helpers;
