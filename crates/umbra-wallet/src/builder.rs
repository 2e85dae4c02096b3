//! High-level transaction builder bound to a pool and chain view.
//!
//! [`TransactionsBuilder`] sits above the wizard: it resolves the account
//! nonce (consulting pending claims when the caller does not pin one),
//! verifies the projected balance covers the spend plus the fee, guards
//! against duplicate in-flight stake operations, and optionally propagates
//! the finished transaction into the pool. A single mutex serializes
//! builds so two concurrent calls cannot race to the same nonce.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use umbra_core::crypto::KeyPair;
use umbra_core::mempool::Mempool;
use umbra_core::traits::{AccountState, ChainStateProvider};
use umbra_core::transaction::{Transaction, TransparentOutput, TransparentScript};
use umbra_core::types::{AssetId, Hash256, KeyBytes};

use crate::error::WalletError;
use crate::wizard;

pub struct TransactionsBuilder {
    mempool: Arc<Mempool>,
    chain: Arc<dyn ChainStateProvider>,
    // Serializes nonce resolution against pool admission.
    lock: Mutex<()>,
}

impl TransactionsBuilder {
    pub fn new(mempool: Arc<Mempool>, chain: Arc<dyn ChainStateProvider>) -> Self {
        Self { mempool, chain, lock: Mutex::new(()) }
    }

    fn account(&self, key: &KeyBytes) -> Result<AccountState, WalletError> {
        self.chain.account(key).ok_or(WalletError::AccountNotFound)
    }

    /// Resolve the nonce to use: the caller's pin, or the lowest nonce not
    /// confirmed and not claimed by a pending transaction.
    fn resolve_nonce(&self, key: &KeyBytes, pinned: Option<u64>, confirmed: u64) -> u64 {
        pinned.unwrap_or_else(|| self.mempool.next_nonce(key, confirmed))
    }

    fn propagate(&self, tx: Transaction) -> Result<Transaction, WalletError> {
        let (height, _) = self.chain.chain_tip();
        self.mempool.add_tx(tx.clone(), height, false)?;
        info!(hash = %tx.identity_hash().short(), "transaction propagated to pool");
        Ok(tx)
    }

    /// Build, sign, and optionally propagate a transfer spending `amount`
    /// of `asset` to `destination`. The fee is paid in `asset`.
    pub fn create_transfer(
        &self,
        key: &KeyPair,
        nonce: Option<u64>,
        amount: u64,
        destination: Hash256,
        asset: AssetId,
        rate: Option<u64>,
        propagate: bool,
    ) -> Result<Transaction, WalletError> {
        let _guard = self.lock.lock();

        let sender = key.public_key().to_bytes();
        let account = self.account(&sender)?;
        let nonce = self.resolve_nonce(&sender, nonce, account.nonce);

        let dsts = vec![TransparentOutput { amount, public_key_hash: destination, asset }];
        let tx = wizard::create_transfer_tx(
            nonce,
            &[key],
            &[amount],
            &[asset],
            dsts,
            rate,
            &asset,
        )
        .map_err(WalletError::Wizard)?;

        let fee = tx.fee().map_err(|e| WalletError::Wizard(e.into()))?;
        let need = amount
            .checked_add(fee)
            .ok_or(WalletError::InsufficientFunds { have: 0, need: u64::MAX })?;
        let have =
            self.mempool
                .project_transparent_balance(&sender, &asset, account.available(&asset))?;
        if have < need {
            return Err(WalletError::InsufficientFunds { have, need });
        }

        if propagate { self.propagate(tx) } else { Ok(tx) }
    }

    /// Build, sign, and optionally propagate an unstake of
    /// `unstake_amount` umbrals. With `pay_fee_in_extra` the fee is
    /// debited from the staked balance too; otherwise the available
    /// balance must cover it. At most one unstake may be in flight per
    /// account.
    pub fn create_unstake(
        &self,
        key: &KeyPair,
        nonce: Option<u64>,
        unstake_amount: u64,
        rate: Option<u64>,
        fee_asset: AssetId,
        pay_fee_in_extra: bool,
        propagate: bool,
    ) -> Result<Transaction, WalletError> {
        let _guard = self.lock.lock();

        let sender = key.public_key().to_bytes();
        if self
            .mempool
            .exists_transparent_version(&sender, TransparentScript::Unstake)
        {
            return Err(WalletError::DuplicateInFlight("unstake"));
        }
        let account = self.account(&sender)?;
        let nonce = self.resolve_nonce(&sender, nonce, account.nonce);

        let tx = wizard::create_unstake_tx(
            nonce,
            key,
            unstake_amount,
            rate,
            &fee_asset,
            pay_fee_in_extra,
        )
        .map_err(WalletError::Wizard)?;
        let fee = tx.fee().map_err(|e| WalletError::Wizard(e.into()))?;

        if pay_fee_in_extra {
            let need = unstake_amount
                .checked_add(fee)
                .ok_or(WalletError::InsufficientStake { have: account.staked, need: u64::MAX })?;
            if account.staked < need {
                return Err(WalletError::InsufficientStake { have: account.staked, need });
            }
        } else {
            if account.staked < unstake_amount {
                return Err(WalletError::InsufficientStake {
                    have: account.staked,
                    need: unstake_amount,
                });
            }
            let have = self.mempool.project_transparent_balance(
                &sender,
                &fee_asset,
                account.available(&fee_asset),
            )?;
            if have < fee {
                return Err(WalletError::InsufficientFunds { have, need: fee });
            }
        }

        if propagate { self.propagate(tx) } else { Ok(tx) }
    }

    /// Build, sign, and optionally propagate a delegation of
    /// `delegate_amount` umbrals from the available balance into stake,
    /// optionally rotating the forging key. At most one delegate may be in
    /// flight per account.
    pub fn create_delegate(
        &self,
        key: &KeyPair,
        nonce: Option<u64>,
        delegate_amount: u64,
        new_public_key: Option<KeyBytes>,
        rate: Option<u64>,
        fee_asset: AssetId,
        propagate: bool,
    ) -> Result<Transaction, WalletError> {
        let _guard = self.lock.lock();

        let sender = key.public_key().to_bytes();
        if self
            .mempool
            .exists_transparent_version(&sender, TransparentScript::Delegate)
        {
            return Err(WalletError::DuplicateInFlight("delegate"));
        }
        let account = self.account(&sender)?;
        let nonce = self.resolve_nonce(&sender, nonce, account.nonce);

        let tx = wizard::create_delegate_tx(
            nonce,
            key,
            delegate_amount,
            new_public_key,
            rate,
            &fee_asset,
        )
        .map_err(WalletError::Wizard)?;
        let fee = tx.fee().map_err(|e| WalletError::Wizard(e.into()))?;

        let need = delegate_amount
            .checked_add(fee)
            .ok_or(WalletError::InsufficientFunds { have: 0, need: u64::MAX })?;
        let have = self.mempool.project_transparent_balance(
            &sender,
            &fee_asset,
            account.available(&fee_asset),
        )?;
        if have < need {
            return Err(WalletError::InsufficientFunds { have, need });
        }

        if propagate { self.propagate(tx) } else { Ok(tx) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use umbra_core::constants::{COIN, NATIVE_ASSET};

    struct MockChain {
        accounts: HashMap<KeyBytes, AccountState>,
        tip: (u64, Hash256),
    }

    impl MockChain {
        fn with_account(key: KeyBytes, balance: u64, staked: u64, nonce: u64) -> Self {
            let mut balances = HashMap::new();
            balances.insert(NATIVE_ASSET, balance);
            let mut accounts = HashMap::new();
            accounts.insert(key, AccountState { nonce, balances, staked });
            Self { accounts, tip: (10, Hash256([0xaa; 32])) }
        }
    }

    impl ChainStateProvider for MockChain {
        fn chain_tip(&self) -> (u64, Hash256) {
            self.tip
        }
        fn account(&self, key: &KeyBytes) -> Option<AccountState> {
            self.accounts.get(key).cloned()
        }
        fn confidential_balance(&self, _key: &KeyBytes, _asset: &AssetId) -> Option<Vec<u8>> {
            None
        }
    }

    fn builder_for(key: &KeyPair, balance: u64, staked: u64, nonce: u64) -> TransactionsBuilder {
        let chain = MockChain::with_account(key.public_key().to_bytes(), balance, staked, nonce);
        TransactionsBuilder::new(Arc::new(Mempool::new()), Arc::new(chain))
    }

    #[test]
    fn transfer_resolves_nonce_and_propagates() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let builder = builder_for(&key, COIN, 0, 4);

        let tx = builder
            .create_transfer(&key, None, 1_000, Hash256([0xbb; 32]), NATIVE_ASSET, Some(10), true)
            .unwrap();
        assert_eq!(tx.nonce(), Some(4));
        assert!(builder.mempool.contains(&tx.identity_hash()));

        // The next build sees the pending claim on nonce 4.
        let tx2 = builder
            .create_transfer(&key, None, 1_000, Hash256([0xbb; 32]), NATIVE_ASSET, Some(10), false)
            .unwrap();
        assert_eq!(tx2.nonce(), Some(5));
    }

    #[test]
    fn transfer_checks_projected_balance() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let builder = builder_for(&key, 1_500, 0, 0);

        // First spend drains most of it and lands in the pool.
        builder
            .create_transfer(&key, None, 500, Hash256([0xbb; 32]), NATIVE_ASSET, Some(1), true)
            .unwrap();

        // A second spend of the same size no longer fits the projection.
        let err = builder
            .create_transfer(&key, None, 1_000, Hash256([0xbb; 32]), NATIVE_ASSET, Some(1), false)
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    }

    #[test]
    fn unknown_account_is_rejected() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let other = KeyPair::from_secret_bytes([8u8; 32]);
        let builder = builder_for(&key, COIN, 0, 0);

        let err = builder
            .create_transfer(&other, None, 100, Hash256([0xbb; 32]), NATIVE_ASSET, Some(10), false)
            .unwrap_err();
        assert_eq!(err, WalletError::AccountNotFound);
    }

    #[test]
    fn only_one_unstake_in_flight() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let builder = builder_for(&key, COIN, 10 * COIN, 0);

        builder
            .create_unstake(&key, None, COIN, Some(10), NATIVE_ASSET, true, true)
            .unwrap();
        let err = builder
            .create_unstake(&key, None, COIN, Some(10), NATIVE_ASSET, true, true)
            .unwrap_err();
        assert_eq!(err, WalletError::DuplicateInFlight("unstake"));
    }

    #[test]
    fn unstake_requires_stake_to_cover_fee_extra() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let builder = builder_for(&key, COIN, 1_000, 0);

        let err = builder
            .create_unstake(&key, None, 1_000, Some(10), NATIVE_ASSET, true, false)
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientStake { .. }));
    }

    #[test]
    fn delegate_guard_and_funds_check() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let builder = builder_for(&key, 2 * COIN, 0, 0);

        builder
            .create_delegate(&key, None, COIN, None, Some(10), NATIVE_ASSET, true)
            .unwrap();
        let err = builder
            .create_delegate(&key, None, COIN, None, Some(10), NATIVE_ASSET, true)
            .unwrap_err();
        assert_eq!(err, WalletError::DuplicateInFlight("delegate"));
    }

    #[test]
    fn pinned_nonce_is_respected() {
        let key = KeyPair::from_secret_bytes([9u8; 32]);
        let builder = builder_for(&key, COIN, 0, 4);

        let tx = builder
            .create_transfer(&key, Some(9), 100, Hash256([0xbb; 32]), NATIVE_ASSET, Some(10), false)
            .unwrap();
        assert_eq!(tx.nonce(), Some(9));
    }
}
