//! Property tests for the transparent balance projection.

use proptest::prelude::*;

use umbra_core::constants::NATIVE_ASSET;
use umbra_core::types::Hash256;
use umbra_tests::helpers::{key, node_with_accounts, transfer};

proptest! {
    /// Projecting over any set of pending transfers debits exactly the
    /// sum of their inputs from the base.
    #[test]
    fn projection_debits_the_pending_sum(
        spends in prop::collection::vec((1_000u64..50_000, 10u64..500), 1..8),
    ) {
        let sender = key(1);
        let node = node_with_accounts(&[(&sender, u64::MAX, 0)]);

        let mut total: u64 = 0;
        for (nonce, (amount, fee)) in spends.iter().enumerate() {
            node.submit_transaction(transfer(&sender, nonce as u64, *amount, *fee, Hash256([0xaa; 32])))
                .unwrap();
            total += amount + fee;
        }

        let base = 1_000_000u64;
        let projected = node
            .mempool()
            .project_transparent_balance(&sender.public_key().to_bytes(), &NATIVE_ASSET, base)
            .unwrap();
        prop_assert_eq!(projected, base - total);
    }

    /// A sender with no pending transactions projects to the base
    /// unchanged, whatever other senders are doing.
    #[test]
    fn projection_ignores_other_senders(base in 0u64..1_000_000) {
        let busy = key(1);
        let idle = key(2);
        let node = node_with_accounts(&[(&busy, u64::MAX, 0)]);
        node.submit_transaction(transfer(&busy, 0, 5_000, 100, Hash256([0xaa; 32]))).unwrap();

        let projected = node
            .mempool()
            .project_transparent_balance(&idle.public_key().to_bytes(), &NATIVE_ASSET, base)
            .unwrap();
        prop_assert_eq!(projected, base);
    }
}
