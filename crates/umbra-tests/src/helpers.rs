//! Shared helpers for the integration tests.

use std::sync::Arc;

use umbra_core::block::{Block, BlockHeader, transactions_merkle};
use umbra_core::constants::NATIVE_ASSET;
use umbra_core::crypto::KeyPair;
use umbra_core::elgamal::ConfidentialKeyPair;
use umbra_core::transaction::{
    Transaction, TransactionKind, TransparentExtra, TransparentInput, TransparentOutput,
    TransparentScript, TransparentTx,
};
use umbra_core::types::Hash256;
use umbra_node_lib::{Node, NodeConfig};

/// Deterministic transparent keypair from a seed byte.
pub fn key(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// Deterministic confidential keypair from a seed byte.
pub fn conf_key(seed: u8) -> ConfidentialKeyPair {
    ConfidentialKeyPair::from_seed(&[seed; 64])
}

/// An unsigned transfer from `sender` spending `amount + fee` of the
/// native asset.
pub fn transfer(sender: &KeyPair, nonce: u64, amount: u64, fee: u64, dst: Hash256) -> Transaction {
    Transaction {
        version: 0,
        kind: TransactionKind::Transparent(TransparentTx {
            script: TransparentScript::Transfer,
            nonce,
            vin: vec![TransparentInput {
                amount: amount + fee,
                public_key: sender.public_key().to_bytes(),
                asset: NATIVE_ASSET,
                signature: [0u8; 64],
            }],
            vout: vec![TransparentOutput { amount, public_key_hash: dst, asset: NATIVE_ASSET }],
            extra: TransparentExtra::None,
        }),
    }
}

/// A node whose store holds the given `(key, balance, staked)` accounts.
pub fn node_with_accounts(accounts: &[(&KeyPair, u64, u64)]) -> Arc<Node> {
    let node = Node::new(NodeConfig::default());
    {
        let mut store = node.store().write();
        for (key, balance, staked) in accounts {
            store.fund_account(&key.public_key().to_bytes(), NATIVE_ASSET, *balance);
            store.fund_stake(&key.public_key().to_bytes(), *staked);
        }
    }
    node
}

/// A block over `txs` at the node's current tip, with a correct merkle
/// hash and signed by `forger`.
pub fn block_over(node: &Node, forger: &KeyPair, txs: &[Arc<Transaction>]) -> Block {
    let hashes: Vec<Hash256> = txs.iter().map(|tx| tx.identity_hash()).collect();
    let (height, tip_hash) = node.chain_tip();
    let mut block = Block {
        header: BlockHeader { version: 0, height: height + 1 },
        merkle_hash: transactions_merkle(&hashes),
        prev_hash: tip_hash,
        prev_kernel_hash: node.store().read().tip_kernel_hash(),
        timestamp: 1_700_000_000 + height,
        staking_amount: 1_000,
        forger_public_key: forger.public_key().to_bytes(),
        staking_fee: 0,
        forger_signature: [0u8; 64],
    };
    block.forger_signature = forger.sign_hash(&block.signing_hash());
    block
}
