//! Proof-of-stake forging loop.
//!
//! Each tick the forger reads the tip, asks the pool for the current
//! candidate list, assembles a block over it, and tests the kernel hash
//! against a stake-weighted target. The candidate list is only used when
//! the pool served it for the tip the forger read; a mismatched snapshot
//! means a block connected mid-attempt, and the attempt is skipped.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use umbra_core::block::{Block, BlockHeader, transactions_merkle};
use umbra_core::constants::STAKING_FEE_MAX;
use umbra_core::crypto::KeyPair;
use umbra_core::mempool::{Mempool, unix_now};
use umbra_core::transaction::Transaction;
use umbra_core::types::Hash256;

use crate::chain::ChainStore;
use crate::config::NodeConfig;

/// A block the forger won eligibility for, with the transactions its
/// merkle hash commits to.
pub struct ForgedBlock {
    pub block: Block,
    pub txs: Vec<Arc<Transaction>>,
}

/// Whether a kernel hash wins forging eligibility for `staking_amount`.
///
/// The kernel's leading 8 bytes, read big-endian, must fall below
/// `staking_amount * target_base`: doubling the stake doubles the window
/// of winning kernels.
pub fn kernel_meets_target(kernel: &Hash256, staking_amount: u64, target_base: u64) -> bool {
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&kernel.as_bytes()[..8]);
    let value = u64::from_be_bytes(prefix) as u128;
    value < (staking_amount as u128) * (target_base as u128)
}

pub struct Forger {
    store: Arc<RwLock<ChainStore>>,
    mempool: Arc<Mempool>,
    keypair: KeyPair,
    config: NodeConfig,
}

impl Forger {
    pub fn new(
        store: Arc<RwLock<ChainStore>>,
        mempool: Arc<Mempool>,
        keypair: KeyPair,
        config: NodeConfig,
    ) -> Self {
        Self { store, mempool, keypair, config }
    }

    /// One forging attempt against the current tip. `None` when the
    /// account has no stake, the candidate snapshot is stale, or the
    /// kernel misses the target.
    pub(crate) fn attempt(&self) -> Option<ForgedBlock> {
        let forger_key = self.keypair.public_key().to_bytes();
        let (height, tip_hash, prev_kernel, staked) = {
            let store = self.store.read();
            let (height, tip_hash) = store.chain_tip();
            let staked = store.account(&forger_key).map(|a| a.staked).unwrap_or(0);
            (height, tip_hash, store.tip_kernel_hash(), staked)
        };
        if staked == 0 {
            return None;
        }

        let (txs, served_tip) = self.mempool.next_transactions_to_include(Some(&tip_hash));
        if served_tip != tip_hash {
            debug!(tip = %tip_hash.short(), served = %served_tip.short(), "candidate snapshot is stale, skipping attempt");
            return None;
        }

        let hashes: Vec<Hash256> = txs.iter().map(|tx| tx.identity_hash()).collect();
        let mut block = Block {
            header: BlockHeader { version: 0, height: height + 1 },
            merkle_hash: transactions_merkle(&hashes),
            prev_hash: tip_hash,
            prev_kernel_hash: prev_kernel,
            timestamp: unix_now(),
            staking_amount: staked,
            forger_public_key: forger_key,
            staking_fee: self.config.staking_fee.min(STAKING_FEE_MAX),
            forger_signature: [0u8; 64],
        };

        if !kernel_meets_target(&block.kernel_hash(), staked, self.config.stake_target_base) {
            return None;
        }

        block.forger_signature = self.keypair.sign_hash(&block.signing_hash());
        info!(height = block.header.height, txs = txs.len(), "forged a block");
        Some(ForgedBlock { block, txs })
    }

    /// Run until `shutdown` flips to true or the output channel closes.
    pub async fn run(self, out: mpsc::Sender<ForgedBlock>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.forge_interval());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Some(forged) = self.attempt() {
                        if out.send(forged).await.is_err() {
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("forger stopping");
                        break;
                    }
                }
            }
        }
    }
}
