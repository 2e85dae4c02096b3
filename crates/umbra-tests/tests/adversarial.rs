//! Adversarial flows: nonce conflicts, replacement abuse, overdrafts,
//! and tampered blocks.

use std::sync::Arc;

use umbra_core::constants::{COIN, NATIVE_ASSET};
use umbra_core::error::MempoolError;
use umbra_core::types::Hash256;
use umbra_tests::helpers::{block_over, key, node_with_accounts, transfer};
use umbra_wallet::WalletError;

#[test]
fn conflicting_nonce_is_rejected_without_replacement() {
    let sender = key(1);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);

    node.submit_transaction(transfer(&sender, 0, 1_000, 100, Hash256([0xaa; 32]))).unwrap();
    let err = node
        .submit_transaction(transfer(&sender, 0, 2_000, 100, Hash256([0xbb; 32])))
        .unwrap_err();
    assert!(matches!(
        err,
        umbra_node_lib::NodeError::Mempool(MempoolError::DuplicateNonce { nonce: 0, .. })
    ));
    assert_eq!(node.mempool().len(), 1);
}

#[test]
fn replacement_requires_a_strictly_higher_fee() {
    let sender = key(1);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);
    let pool = node.mempool();

    let original = transfer(&sender, 0, 1_000, 100, Hash256([0xaa; 32]));
    let original_hash = original.identity_hash();
    pool.add_tx(original, 0, false).unwrap();

    // Same fee: replacement refused even with the replace flag.
    let same_fee = transfer(&sender, 0, 2_000, 100, Hash256([0xbb; 32]));
    assert!(matches!(
        pool.add_tx(same_fee, 0, true),
        Err(MempoolError::DuplicateNonce { .. })
    ));
    assert!(pool.contains(&original_hash));

    // Higher fee: incumbent evicted.
    let bumped = transfer(&sender, 0, 2_000, 400, Hash256([0xbb; 32]));
    let bumped_hash = bumped.identity_hash();
    assert!(pool.add_tx(bumped, 0, true).unwrap());
    assert!(!pool.contains(&original_hash));
    assert!(pool.contains(&bumped_hash));
    assert_eq!(pool.len(), 1);
}

#[test]
fn builder_refuses_to_overdraw_the_projection() {
    let sender = key(1);
    let node = node_with_accounts(&[(&sender, 2_000, 0)]);
    let builder = node.transactions_builder();

    builder
        .create_transfer(&sender, None, 1_000, Hash256([0xaa; 32]), NATIVE_ASSET, Some(1), true)
        .unwrap();

    let err = builder
        .create_transfer(&sender, None, 1_000, Hash256([0xaa; 32]), NATIVE_ASSET, Some(1), false)
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { .. }));
}

#[test]
fn pending_spends_beyond_the_base_fail_projection() {
    let sender = key(1);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);

    node.submit_transaction(transfer(&sender, 0, 5_000, 100, Hash256([0xaa; 32]))).unwrap();

    // A caller projecting from a smaller confirmed base than the pending
    // spend gets a hard error, not a wrapped balance.
    let err = node
        .mempool()
        .project_transparent_balance(&sender.public_key().to_bytes(), &NATIVE_ASSET, 1_000)
        .unwrap_err();
    assert!(matches!(err, MempoolError::InsufficientProjected { .. }));
}

#[test]
fn tampered_merkle_hash_is_rejected() {
    let sender = key(1);
    let forger = key(2);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);

    let txs = vec![Arc::new(transfer(&sender, 0, 1_000, 100, Hash256([0xaa; 32])))];
    let mut block = block_over(&node, &forger, &txs);
    block.merkle_hash = Hash256([0x66; 32]);

    assert!(node.process_block(&block, &txs).is_err());
    assert_eq!(node.chain_tip().0, 0);
}

#[test]
fn replayed_block_is_rejected() {
    let sender = key(1);
    let forger = key(2);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);

    let txs = vec![Arc::new(transfer(&sender, 0, 1_000, 100, Hash256([0xaa; 32])))];
    let block = block_over(&node, &forger, &txs);
    node.process_block(&block, &txs).unwrap();

    // The same block no longer extends the tip.
    assert!(matches!(
        node.process_block(&block, &txs),
        Err(umbra_node_lib::NodeError::UnknownParent { .. })
    ));
    assert_eq!(node.chain_tip().0, 1);
}

#[test]
fn stale_nonces_are_pruned_on_confirmation() {
    let sender = key(1);
    let forger = key(2);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);

    // A competing version of nonce 0 sits in the pool but a different
    // transaction confirms it.
    let losing = transfer(&sender, 0, 1_000, 100, Hash256([0xaa; 32]));
    let losing_hash = losing.identity_hash();
    node.submit_transaction(losing).unwrap();

    let winning = Arc::new(transfer(&sender, 0, 2_000, 400, Hash256([0xbb; 32])));
    let txs = vec![winning];
    let block = block_over(&node, &forger, &txs);
    node.process_block(&block, &txs).unwrap();

    // The loser can never confirm (nonce below the account nonce) and is
    // gone.
    assert!(!node.mempool().contains(&losing_hash));
    assert!(node.mempool().is_empty());
}

#[test]
fn duplicate_submission_is_an_idempotent_no_op() {
    let sender = key(1);
    let node = node_with_accounts(&[(&sender, 10 * COIN, 0)]);
    let pool = node.mempool();

    let tx = transfer(&sender, 0, 1_000, 100, Hash256([0xaa; 32]));
    assert!(pool.add_tx(tx.clone(), 0, false).unwrap());
    assert!(!pool.add_tx(tx, 0, false).unwrap());
    assert_eq!(pool.len(), 1);
}
