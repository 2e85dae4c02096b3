//! In-memory chain state and the read-only adapter over it.
//!
//! [`ChainStore`] holds confirmed state: the tip, transparent accounts
//! keyed by public-key hash, and confidential balance ciphertexts keyed by
//! ring member and asset. [`ChainStore::apply_block`] connects a block,
//! replaying its transactions into confirmed state. [`NodeChainState`]
//! bridges the mutable store (behind a `RwLock`) to the read-only
//! [`ChainStateProvider`] trait that the pool and wallet consume.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use umbra_core::block::{Block, transactions_merkle};
use umbra_core::constants::NATIVE_ASSET;
use umbra_core::crypto::pubkey_hash;
use umbra_core::elgamal::{Ciphertext, decode_point};
use umbra_core::traits::{AccountState, ChainStateProvider};
use umbra_core::transaction::{ConfidentialTx, Transaction, TransparentExtra, TransparentTx};
use umbra_core::types::{AssetId, Hash256, KeyBytes};

use crate::error::NodeError;

/// Confirmed chain state, in memory.
pub struct ChainStore {
    tip_height: u64,
    tip_hash: Hash256,
    tip_kernel_hash: Hash256,
    /// Transparent accounts, keyed by public-key hash.
    accounts: HashMap<Hash256, AccountState>,
    /// Confidential balance ciphertexts (64 serialized bytes) per ring
    /// member and asset.
    confidential: HashMap<(KeyBytes, AssetId), Vec<u8>>,
}

impl ChainStore {
    /// Empty store at the genesis tip.
    pub fn new() -> Self {
        Self {
            tip_height: 0,
            tip_hash: Hash256::ZERO,
            tip_kernel_hash: Hash256::ZERO,
            accounts: HashMap::new(),
            confidential: HashMap::new(),
        }
    }

    pub fn chain_tip(&self) -> (u64, Hash256) {
        (self.tip_height, self.tip_hash)
    }

    pub fn tip_kernel_hash(&self) -> Hash256 {
        self.tip_kernel_hash
    }

    pub fn account(&self, key: &KeyBytes) -> Option<AccountState> {
        self.accounts.get(&pubkey_hash(key)).cloned()
    }

    pub fn confidential_balance(&self, key: &KeyBytes, asset: &AssetId) -> Option<Vec<u8>> {
        self.confidential.get(&(*key, *asset)).cloned()
    }

    /// Credit `amount` of `asset` to the account for `key`, creating it if
    /// absent. Genesis allocations and test setup.
    pub fn fund_account(&mut self, key: &KeyBytes, asset: AssetId, amount: u64) {
        let account = self.accounts.entry(pubkey_hash(key)).or_default();
        let balance = account.balances.entry(asset).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Add `amount` to the delegated stake of the account for `key`.
    pub fn fund_stake(&mut self, key: &KeyBytes, amount: u64) {
        let account = self.accounts.entry(pubkey_hash(key)).or_default();
        account.staked = account.staked.saturating_add(amount);
    }

    /// Connect a block at the tip, replaying `txs` into confirmed state.
    ///
    /// `txs` must be the transactions the block's merkle hash commits to,
    /// in inclusion order. On success the tip advances to this block.
    pub fn apply_block(&mut self, block: &Block, txs: &[Arc<Transaction>]) -> Result<(), NodeError> {
        if block.prev_hash != self.tip_hash {
            return Err(NodeError::UnknownParent {
                expected: self.tip_hash.to_string(),
                got: block.prev_hash.to_string(),
            });
        }
        let next_height = self.tip_height + 1;
        if block.header.height != next_height {
            return Err(NodeError::BadHeight { expected: next_height, got: block.header.height });
        }
        block.validate()?;

        let hashes: Vec<Hash256> = txs.iter().map(|tx| tx.identity_hash()).collect();
        if transactions_merkle(&hashes) != block.merkle_hash {
            return Err(NodeError::MerkleMismatch);
        }

        let mut fees: u64 = 0;
        for tx in txs {
            fees = fees
                .checked_add(tx.fee()?)
                .ok_or(umbra_core::error::TransactionError::ValueOverflow)?;
            if let Some(t) = tx.as_transparent() {
                self.apply_transparent(t)?;
            }
            if let Some(c) = tx.as_confidential() {
                self.apply_confidential(c)?;
            }
        }

        // Collected fees accrue to the forger's available balance.
        if fees > 0 {
            self.fund_account(&block.forger_public_key, NATIVE_ASSET, fees);
        }

        self.tip_height = next_height;
        self.tip_hash = block.hash();
        self.tip_kernel_hash = block.kernel_hash();
        debug!(height = next_height, tip = %self.tip_hash.short(), txs = txs.len(), "block connected");
        Ok(())
    }

    fn apply_transparent(&mut self, t: &TransparentTx) -> Result<(), NodeError> {
        let sender = t.vin.first().map(|vin| vin.public_key).unwrap_or_default();
        let sender_hash = pubkey_hash(&sender);

        for vin in &t.vin {
            let hash = pubkey_hash(&vin.public_key);
            let account = self.accounts.entry(hash).or_default();
            let balance = account.balances.entry(vin.asset).or_insert(0);
            *balance = balance
                .checked_sub(vin.amount)
                .ok_or_else(|| NodeError::Underfunded(hash.to_string()))?;
        }

        match &t.extra {
            TransparentExtra::None => {}
            TransparentExtra::Unstake { unstake_amount, fee_extra } => {
                let account = self.accounts.entry(sender_hash).or_default();
                let total = unstake_amount
                    .checked_add(*fee_extra)
                    .ok_or(umbra_core::error::TransactionError::ValueOverflow)?;
                account.staked = account
                    .staked
                    .checked_sub(total)
                    .ok_or_else(|| NodeError::Underfunded(sender_hash.to_string()))?;
                let balance = account.balances.entry(NATIVE_ASSET).or_insert(0);
                *balance = balance
                    .checked_add(*unstake_amount)
                    .ok_or(umbra_core::error::TransactionError::ValueOverflow)?;
            }
            TransparentExtra::Delegate { delegate_amount, .. } => {
                let account = self.accounts.entry(sender_hash).or_default();
                let balance = account.balances.entry(NATIVE_ASSET).or_insert(0);
                *balance = balance
                    .checked_sub(*delegate_amount)
                    .ok_or_else(|| NodeError::Underfunded(sender_hash.to_string()))?;
                account.staked = account
                    .staked
                    .checked_add(*delegate_amount)
                    .ok_or(umbra_core::error::TransactionError::ValueOverflow)?;
            }
        }

        for vout in &t.vout {
            let account = self.accounts.entry(vout.public_key_hash).or_default();
            let balance = account.balances.entry(vout.asset).or_insert(0);
            *balance = balance
                .checked_add(vout.amount)
                .ok_or(umbra_core::error::TransactionError::ValueOverflow)?;
        }

        // Confirming any nonce up to n implies nonces below n are spent.
        let account = self.accounts.entry(sender_hash).or_default();
        let spent = t
            .nonce
            .checked_add(1)
            .ok_or(umbra_core::error::TransactionError::ValueOverflow)?;
        account.nonce = account.nonce.max(spent);
        Ok(())
    }

    fn apply_confidential(&mut self, c: &ConfidentialTx) -> Result<(), NodeError> {
        for payload in &c.payloads {
            for (pos, member) in payload.ring.iter().enumerate() {
                let delta = Ciphertext::from_parts(&payload.commitments[pos], &payload.d)?;
                let current = match self.confidential.get(&(*member, payload.asset)) {
                    Some(bytes) => Ciphertext::deserialize(bytes)?,
                    None => Ciphertext::zero_balance(&decode_point(member)?),
                };
                self.confidential
                    .insert((*member, payload.asset), current.add(&delta).serialize().to_vec());
            }
        }
        Ok(())
    }
}

impl Default for ChainStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter bridging `ChainStore` (behind `RwLock`) to the read-only
/// [`ChainStateProvider`] trait.
///
/// Takes a read lock per call, so the pool and wallet read chain state
/// concurrently with block connection.
pub struct NodeChainState {
    store: Arc<RwLock<ChainStore>>,
}

impl NodeChainState {
    pub fn new(store: Arc<RwLock<ChainStore>>) -> Self {
        Self { store }
    }
}

impl ChainStateProvider for NodeChainState {
    fn chain_tip(&self) -> (u64, Hash256) {
        self.store.read().chain_tip()
    }

    fn account(&self, key: &KeyBytes) -> Option<AccountState> {
        self.store.read().account(key)
    }

    fn confidential_balance(&self, key: &KeyBytes, asset: &AssetId) -> Option<Vec<u8>> {
        self.store.read().confidential_balance(key, asset)
    }
}
