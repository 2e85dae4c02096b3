//! Confidential balance flows: homomorphic projection over pending
//! transactions and ciphertext folding on block connection.

use std::sync::Arc;

use curve25519_dalek::scalar::Scalar;
use umbra_core::constants::NATIVE_ASSET;
use umbra_core::elgamal::Ciphertext;
use umbra_core::error::MempoolError;
use umbra_core::mempool::CancelToken;
use umbra_core::traits::ChainStateProvider;
use umbra_core::transaction::{
    ConfidentialPayload, ConfidentialScript, ConfidentialTx, Transaction, TransactionKind,
};
use umbra_tests::helpers::{block_over, conf_key, key, node_with_accounts};

/// A confidential transaction crediting `amount` to `recipient` at ring
/// position 0, under blinding `blinding`.
fn conf_credit(
    recipient: &umbra_core::elgamal::ConfidentialKeyPair,
    amount: u64,
    blinding: u64,
    fee: u64,
) -> Transaction {
    let delta = Ciphertext::encrypt(amount, recipient.public(), &Scalar::from(blinding));
    let (commitment, d) = delta.to_parts();
    Transaction {
        version: 0,
        kind: TransactionKind::Confidential(ConfidentialTx {
            payloads: vec![ConfidentialPayload {
                script: ConfidentialScript::Transfer,
                asset: NATIVE_ASSET,
                fee,
                ring: vec![recipient.public_bytes()],
                commitments: vec![commitment],
                d,
                proof: vec![blinding as u8; 64],
            }],
        }),
    }
}

#[test]
fn projection_matches_decrypted_sum() {
    let account = conf_key(9);
    let node = node_with_accounts(&[]);

    // Confirmed base of 100, plus pending credits of 40 and 2.
    let base = Ciphertext::encrypt(100, account.public(), &Scalar::from(77u64));
    node.submit_transaction(conf_credit(&account, 40, 11, 5)).unwrap();
    node.submit_transaction(conf_credit(&account, 2, 12, 6)).unwrap();

    let base_bytes = base.serialize();
    let projected = node
        .mempool()
        .project_confidential_balance(
            &account.public_bytes(),
            Some(&base_bytes[..]),
            &NATIVE_ASSET,
            None,
        )
        .unwrap()
        .expect("account is touched by pending txs");

    let ciphertext = Ciphertext::deserialize(&projected).unwrap();
    assert_eq!(ciphertext.decrypt_small(account.secret(), 1_000), Some(142));
}

#[test]
fn untouched_account_projects_to_none() {
    let account = conf_key(9);
    let other = conf_key(8);
    let node = node_with_accounts(&[]);
    node.submit_transaction(conf_credit(&other, 40, 11, 5)).unwrap();

    let projected = node
        .mempool()
        .project_confidential_balance(&account.public_bytes(), None, &NATIVE_ASSET, None)
        .unwrap();
    assert!(projected.is_none());
}

#[test]
fn cancelled_projection_aborts() {
    let account = conf_key(9);
    let node = node_with_accounts(&[]);
    node.submit_transaction(conf_credit(&account, 40, 11, 5)).unwrap();

    let token = CancelToken::new();
    token.cancel();
    let err = node
        .mempool()
        .project_confidential_balance(
            &account.public_bytes(),
            None,
            &NATIVE_ASSET,
            Some(&token),
        )
        .unwrap_err();
    assert_eq!(err, MempoolError::Cancelled);
}

#[test]
fn block_connection_folds_deltas_into_confirmed_state() {
    let account = conf_key(9);
    let forger = key(2);
    let node = node_with_accounts(&[]);

    let txs = vec![
        Arc::new(conf_credit(&account, 40, 11, 5)),
        Arc::new(conf_credit(&account, 2, 12, 6)),
    ];
    let block = block_over(&node, &forger, &txs);
    node.process_block(&block, &txs).unwrap();

    let stored = node
        .chain_state()
        .confidential_balance(&account.public_bytes(), &NATIVE_ASSET)
        .expect("confirmed ciphertext exists after connection");
    let balance = Ciphertext::deserialize(&stored).unwrap();
    assert_eq!(balance.decrypt_small(account.secret(), 1_000), Some(42));

    // With a base supplied and nothing pending, projection passes the
    // base through untouched.
    let projected = node
        .mempool()
        .project_confidential_balance(
            &account.public_bytes(),
            Some(&stored[..]),
            &NATIVE_ASSET,
            None,
        )
        .unwrap()
        .expect("base-supplied projection is always Some");
    assert_eq!(projected, stored);
}

#[test]
fn malformed_base_ciphertext_is_rejected() {
    let account = conf_key(9);
    let node = node_with_accounts(&[]);
    node.submit_transaction(conf_credit(&account, 40, 11, 5)).unwrap();

    let err = node
        .mempool()
        .project_confidential_balance(
            &account.public_bytes(),
            Some(&[0xff; 64][..]),
            &NATIVE_ASSET,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, MempoolError::Crypto(_)));
}
