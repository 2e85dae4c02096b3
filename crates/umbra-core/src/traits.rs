//! Trait interfaces between crates.
//!
//! [`ChainStateProvider`] is the read-only seam between the mempool/wallet
//! side and confirmed chain state. Implemented by the node (umbra-node)
//! over its chain store; tests implement it with an in-memory map.

use std::collections::HashMap;

use crate::types::{AssetId, Hash256, KeyBytes};

/// Confirmed state of a transparent account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    /// Next expected transaction nonce.
    pub nonce: u64,
    /// Available (spendable) balance per asset, in asset units.
    pub balances: HashMap<AssetId, u64>,
    /// Delegated stake in umbrals, available for unstaking.
    pub staked: u64,
}

impl AccountState {
    /// Available balance for one asset; zero if the account never held it.
    pub fn available(&self, asset: &AssetId) -> u64 {
        self.balances.get(asset).copied().unwrap_or(0)
    }
}

/// Read-only view of confirmed chain state.
pub trait ChainStateProvider: Send + Sync {
    /// Current chain tip as `(height, block_hash)`.
    fn chain_tip(&self) -> (u64, Hash256);

    /// Confirmed state of a transparent account, by its public key.
    /// `None` if the account has never appeared on chain.
    fn account(&self, key: &KeyBytes) -> Option<AccountState>;

    /// Confirmed balance ciphertext of a confidential account for one
    /// asset (64 serialized bytes). `None` if the account has no confirmed
    /// balance for that asset.
    fn confidential_balance(&self, key: &KeyBytes, asset: &AssetId) -> Option<Vec<u8>>;
}
