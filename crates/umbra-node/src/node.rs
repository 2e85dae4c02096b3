//! Full node composition.
//!
//! [`Node`] wires the chain store, the transaction pool, and the wallet
//! builder together, and owns block connection: applying a block to the
//! store, registering the new tip with the pool, and evicting confirmed
//! and stale transactions.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use umbra_core::block::Block;
use umbra_core::crypto::KeyPair;
use umbra_core::mempool::Mempool;
use umbra_core::traits::ChainStateProvider;
use umbra_core::transaction::Transaction;
use umbra_core::types::Hash256;
use umbra_wallet::TransactionsBuilder;

use crate::chain::{ChainStore, NodeChainState};
use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::forger::{ForgedBlock, Forger};

pub struct Node {
    store: Arc<RwLock<ChainStore>>,
    chain: Arc<NodeChainState>,
    mempool: Arc<Mempool>,
    config: NodeConfig,
}

impl Node {
    pub fn new(config: NodeConfig) -> Arc<Self> {
        let store = Arc::new(RwLock::new(ChainStore::new()));
        let chain = Arc::new(NodeChainState::new(Arc::clone(&store)));
        let mempool = Arc::new(Mempool::new());
        Arc::new(Self { store, chain, mempool, config })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    /// Read-only chain state view, as consumed by the pool and wallet.
    pub fn chain_state(&self) -> Arc<NodeChainState> {
        Arc::clone(&self.chain)
    }

    /// Mutable access to the chain store, for genesis allocations.
    pub fn store(&self) -> &Arc<RwLock<ChainStore>> {
        &self.store
    }

    pub fn chain_tip(&self) -> (u64, Hash256) {
        self.chain.chain_tip()
    }

    /// A wallet builder bound to this node's pool and chain view.
    pub fn transactions_builder(self: &Arc<Self>) -> TransactionsBuilder {
        TransactionsBuilder::new(Arc::clone(&self.mempool), self.chain_state())
    }

    /// Admit a transaction into the pool at the current tip height.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash256, NodeError> {
        let hash = tx.identity_hash();
        let (height, _) = self.chain.chain_tip();
        self.mempool.add_tx(tx, height, false)?;
        Ok(hash)
    }

    /// Connect a block: apply it to the store, move the pool to the new
    /// tip, and evict confirmed and stale transactions.
    pub fn process_block(&self, block: &Block, txs: &[Arc<Transaction>]) -> Result<(), NodeError> {
        let height = {
            let mut store = self.store.write();
            store.apply_block(block, txs)?;
            store.chain_tip().0
        };
        info!(height, txs = txs.len(), "connected block");

        self.mempool.update_chain_tip(height, block.hash());
        let confirmed: Vec<Hash256> = txs.iter().map(|tx| tx.identity_hash()).collect();
        self.mempool.remove_confirmed(&confirmed, &*self.chain);
        Ok(())
    }

    /// Spawn the forging loop, connecting blocks it wins.
    ///
    /// Returns the task handle; flip `shutdown` to true to stop it.
    pub fn start_forging(
        self: &Arc<Self>,
        keypair: KeyPair,
        shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let forger = Forger::new(
            Arc::clone(&self.store),
            Arc::clone(&self.mempool),
            keypair,
            self.config.clone(),
        );
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let (out, mut forged_rx) = mpsc::channel::<ForgedBlock>(4);
            let loop_handle = tokio::spawn(forger.run(out, shutdown));
            while let Some(forged) = forged_rx.recv().await {
                if let Err(e) = node.process_block(&forged.block, &forged.txs) {
                    warn!("discarding forged block: {e}");
                }
            }
            let _ = loop_handle.await;
        })
    }
}
