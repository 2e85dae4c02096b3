//! Transaction wizard: construction, fee fixed point, and signing.
//!
//! The fee depends on the serialized size, and the serialized size depends
//! on the fee's own varint width — so [`set_fee`] iterates to a fixed
//! point: embed the current fee, reserialize, recompute the required fee,
//! and stop when it no longer moves. Varint widths change only at
//! power-of-two-ish boundaries, so this settles in two rounds in practice,
//! but the loop is bounded ([`MAX_FEE_ITERATIONS`]) and exceeding the bound
//! is an internal error, never an infinite loop.
//!
//! Two fee modes exist: inflating the input that carries the fee asset
//! (the default), or debiting an unstake's fee-extra field so the fee is
//! paid from the staked balance instead.

use tracing::error;

use umbra_core::constants::{MAX_FEE_ITERATIONS, NATIVE_ASSET};
use umbra_core::crypto::KeyPair;
use umbra_core::error::TransactionError;
use umbra_core::fees;
use umbra_core::transaction::{
    Transaction, TransactionKind, TransparentExtra, TransparentInput, TransparentOutput,
    TransparentScript, TransparentTx,
};
use umbra_core::types::{AssetId, KeyBytes};

use crate::error::WizardError;

/// The field the fixed-point loop writes the fee into.
enum FeeTarget {
    /// `vin[i].amount = initial + fee`.
    VinAmount(usize),
    /// `extra.fee_extra = initial + fee` (unstake only).
    UnstakeExtra,
    /// `payloads[i].fee = initial + fee`.
    PayloadFee(usize),
}

fn locate_fee_target(
    tx: &Transaction,
    fee_asset: &AssetId,
    pay_fee_in_extra: bool,
) -> Result<(FeeTarget, u64), WizardError> {
    match &tx.kind {
        TransactionKind::Transparent(t) => {
            if pay_fee_in_extra {
                match &t.extra {
                    TransparentExtra::Unstake { fee_extra, .. } => {
                        Ok((FeeTarget::UnstakeExtra, *fee_extra))
                    }
                    _ => Err(WizardError::FeeExtraUnsupported),
                }
            } else {
                // A transparent fee is the surplus of native inputs over
                // native outputs, so a fee inflated into a non-native
                // input would never be counted (the pool would grade the
                // transaction at rate zero).
                if fee_asset != &NATIVE_ASSET {
                    return Err(WizardError::NonNativeFee);
                }
                t.vin
                    .iter()
                    .position(|vin| &vin.asset == fee_asset)
                    .map(|i| (FeeTarget::VinAmount(i), t.vin[i].amount))
                    .ok_or(WizardError::NoFeeInput)
            }
        }
        TransactionKind::Confidential(c) => c
            .payloads
            .iter()
            .position(|p| &p.asset == fee_asset)
            .map(|i| (FeeTarget::PayloadFee(i), c.payloads[i].fee))
            .ok_or(WizardError::NoFeeInput),
    }
}

fn apply_fee_value(tx: &mut Transaction, target: &FeeTarget, value: u64) {
    match (&mut tx.kind, target) {
        (TransactionKind::Transparent(t), FeeTarget::VinAmount(i)) => {
            t.vin[*i].amount = value;
        }
        (TransactionKind::Transparent(t), FeeTarget::UnstakeExtra) => {
            if let TransparentExtra::Unstake { fee_extra, .. } = &mut t.extra {
                *fee_extra = value;
            }
        }
        (TransactionKind::Confidential(c), FeeTarget::PayloadFee(i)) => {
            c.payloads[*i].fee = value;
        }
        _ => {}
    }
}

/// Embed the required fee into `tx` by fixed-point iteration.
///
/// `rate` of `Some(0)` means the caller has already set fees and is a
/// no-op; `None` resolves the published rate for `fee_asset` (failing if
/// there is none). Transparent fees must be paid in the native asset;
/// confidential payloads may declare a fee in any asset. Returns the
/// stabilized fee in umbrals.
pub fn set_fee(
    tx: &mut Transaction,
    rate: Option<u64>,
    fee_asset: &AssetId,
    pay_fee_in_extra: bool,
) -> Result<u64, WizardError> {
    set_fee_internal(tx, rate, fee_asset, pay_fee_in_extra).map(|(fee, _)| fee)
}

/// [`set_fee`] exposing the iteration count, for convergence tests.
pub(crate) fn set_fee_internal(
    tx: &mut Transaction,
    rate: Option<u64>,
    fee_asset: &AssetId,
    pay_fee_in_extra: bool,
) -> Result<(u64, u32), WizardError> {
    let rate = match rate {
        Some(0) => return Ok((0, 0)),
        Some(rate) => rate,
        None => {
            let published = fees::fee_per_byte(fee_asset);
            if published == 0 {
                return Err(WizardError::NoPublishedRate);
            }
            published
        }
    };

    let (target, initial) = locate_fee_target(tx, fee_asset, pay_fee_in_extra)?;

    let mut fee: u64 = 0;
    let mut iterations: u32 = 0;
    loop {
        iterations += 1;
        if iterations > MAX_FEE_ITERATIONS {
            error!(iterations, rate, "fee fixed point failed to stabilize");
            return Err(WizardError::FeeFixedPointDivergence(MAX_FEE_ITERATIONS));
        }

        let embedded = initial
            .checked_add(fee)
            .ok_or(WizardError::Transaction(TransactionError::ValueOverflow))?;
        apply_fee_value(tx, &target, embedded);

        let required = fees::compute_tx_fee(tx.serialized_size(), rate)
            .map_err(WizardError::Transaction)?;
        if required == fee {
            return Ok((fee, iterations));
        }
        fee = required;
    }
}

fn sign_inputs(tx: &mut Transaction, keys: &[&KeyPair]) {
    let hash = tx.signing_hash();
    let signatures: Vec<[u8; 64]> = keys.iter().map(|key| key.sign_hash(&hash)).collect();
    if let TransactionKind::Transparent(t) = &mut tx.kind {
        for (vin, signature) in t.vin.iter_mut().zip(signatures) {
            vin.signature = signature;
        }
    }
}

/// Build and sign a transparent transfer.
///
/// `amounts` are the pre-fee amounts debited per input; the input carrying
/// `fee_asset` is inflated by the stabilized fee.
pub fn create_transfer_tx(
    nonce: u64,
    keys: &[&KeyPair],
    amounts: &[u64],
    assets: &[AssetId],
    dsts: Vec<TransparentOutput>,
    rate: Option<u64>,
    fee_asset: &AssetId,
) -> Result<Transaction, WizardError> {
    if keys.len() != amounts.len() || amounts.len() != assets.len() || amounts.is_empty() {
        return Err(WizardError::InputMismatch);
    }
    if dsts.is_empty() {
        return Err(WizardError::InputMismatch);
    }

    let vin = keys
        .iter()
        .zip(amounts)
        .zip(assets)
        .map(|((key, &amount), &asset)| TransparentInput {
            amount,
            public_key: key.public_key().to_bytes(),
            asset,
            signature: [0u8; 64],
        })
        .collect();

    let mut tx = Transaction {
        version: 0,
        kind: TransactionKind::Transparent(TransparentTx {
            script: TransparentScript::Transfer,
            nonce,
            vin,
            vout: dsts,
            extra: TransparentExtra::None,
        }),
    };

    set_fee(&mut tx, rate, fee_asset, false)?;
    sign_inputs(&mut tx, keys);
    tx.validate_structure()?;
    Ok(tx)
}

/// Build and sign an unstake transaction.
///
/// With `pay_fee_in_extra` the fee is debited from the staked balance via
/// the fee-extra field; otherwise the single input's amount carries it.
pub fn create_unstake_tx(
    nonce: u64,
    key: &KeyPair,
    unstake_amount: u64,
    rate: Option<u64>,
    fee_asset: &AssetId,
    pay_fee_in_extra: bool,
) -> Result<Transaction, WizardError> {
    let mut tx = Transaction {
        version: 0,
        kind: TransactionKind::Transparent(TransparentTx {
            script: TransparentScript::Unstake,
            nonce,
            vin: vec![TransparentInput {
                amount: 0,
                public_key: key.public_key().to_bytes(),
                asset: *fee_asset,
                signature: [0u8; 64],
            }],
            vout: Vec::new(),
            extra: TransparentExtra::Unstake { unstake_amount, fee_extra: 0 },
        }),
    };

    set_fee(&mut tx, rate, fee_asset, pay_fee_in_extra)?;
    sign_inputs(&mut tx, &[key]);
    tx.validate_structure()?;
    Ok(tx)
}

/// Build and sign a delegate transaction, optionally rotating the forging
/// key.
pub fn create_delegate_tx(
    nonce: u64,
    key: &KeyPair,
    delegate_amount: u64,
    new_public_key: Option<KeyBytes>,
    rate: Option<u64>,
    fee_asset: &AssetId,
) -> Result<Transaction, WizardError> {
    let mut tx = Transaction {
        version: 0,
        kind: TransactionKind::Transparent(TransparentTx {
            script: TransparentScript::Delegate,
            nonce,
            vin: vec![TransparentInput {
                amount: 0,
                public_key: key.public_key().to_bytes(),
                asset: *fee_asset,
                signature: [0u8; 64],
            }],
            vout: Vec::new(),
            extra: TransparentExtra::Delegate { delegate_amount, new_public_key },
        }),
    };

    set_fee(&mut tx, rate, fee_asset, false)?;
    sign_inputs(&mut tx, &[key]);
    tx.validate_structure()?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use umbra_core::constants::NATIVE_ASSET;
    use umbra_core::types::Hash256;

    fn payment(amount: u64) -> TransparentOutput {
        TransparentOutput {
            amount,
            public_key_hash: Hash256([0xcc; 32]),
            asset: NATIVE_ASSET,
        }
    }

    fn unsigned_transfer(outputs: usize, amount: u64) -> Transaction {
        Transaction {
            version: 0,
            kind: TransactionKind::Transparent(TransparentTx {
                script: TransparentScript::Transfer,
                nonce: 1,
                vin: vec![TransparentInput {
                    amount,
                    public_key: [1u8; 32],
                    asset: NATIVE_ASSET,
                    signature: [0u8; 64],
                }],
                vout: (0..outputs).map(|_| payment(amount / outputs as u64)).collect(),
                extra: TransparentExtra::None,
            }),
        }
    }

    #[test]
    fn embedded_fee_matches_final_size() {
        let kp = KeyPair::from_secret_bytes([5u8; 32]);
        let tx = create_transfer_tx(
            1,
            &[&kp],
            &[10_000],
            &[NATIVE_ASSET],
            vec![payment(10_000)],
            Some(10),
            &NATIVE_ASSET,
        )
        .unwrap();

        let expected = fees::compute_tx_fee(tx.serialized_size(), 10).unwrap();
        assert_eq!(tx.fee().unwrap(), expected);
    }

    #[test]
    fn zero_rate_means_caller_set_fees() {
        let mut tx = unsigned_transfer(1, 5_000);
        let before = tx.clone();
        assert_eq!(set_fee(&mut tx, Some(0), &NATIVE_ASSET, false).unwrap(), 0);
        assert_eq!(tx, before);
    }

    #[test]
    fn unpublished_rate_is_an_error() {
        let mut tx = unsigned_transfer(1, 5_000);
        let foreign = AssetId([3u8; 20]);
        assert_eq!(
            set_fee(&mut tx, None, &foreign, false),
            Err(WizardError::NoPublishedRate)
        );
    }

    #[test]
    fn fee_in_extra_requires_unstake() {
        let mut tx = unsigned_transfer(1, 5_000);
        assert_eq!(
            set_fee(&mut tx, Some(10), &NATIVE_ASSET, true),
            Err(WizardError::FeeExtraUnsupported)
        );
    }

    #[test]
    fn unstake_fee_in_extra_leaves_input_untouched() {
        let kp = KeyPair::from_secret_bytes([6u8; 32]);
        let tx = create_unstake_tx(2, &kp, 9_000, Some(10), &NATIVE_ASSET, true).unwrap();
        let t = tx.as_transparent().unwrap();
        assert_eq!(t.vin[0].amount, 0);
        match t.extra {
            TransparentExtra::Unstake { fee_extra, unstake_amount } => {
                assert_eq!(unstake_amount, 9_000);
                assert_eq!(
                    fee_extra,
                    fees::compute_tx_fee(tx.serialized_size(), 10).unwrap()
                );
            }
            _ => panic!("wrong extra"),
        }
    }

    #[test]
    fn unstake_default_mode_inflates_input() {
        let kp = KeyPair::from_secret_bytes([6u8; 32]);
        let tx = create_unstake_tx(2, &kp, 9_000, Some(10), &NATIVE_ASSET, false).unwrap();
        let t = tx.as_transparent().unwrap();
        assert_eq!(
            t.vin[0].amount,
            fees::compute_tx_fee(tx.serialized_size(), 10).unwrap()
        );
    }

    #[test]
    fn signatures_verify_over_signing_hash() {
        let kp = KeyPair::from_secret_bytes([7u8; 32]);
        let tx = create_transfer_tx(
            0,
            &[&kp],
            &[2_000],
            &[NATIVE_ASSET],
            vec![payment(2_000)],
            Some(10),
            &NATIVE_ASSET,
        )
        .unwrap();

        let t = tx.as_transparent().unwrap();
        kp.public_key()
            .verify(tx.signing_hash().as_bytes(), &t.vin[0].signature)
            .unwrap();
    }

    #[test]
    fn missing_fee_input_is_an_error() {
        let mut tx = unsigned_transfer(1, 5_000);
        if let TransactionKind::Transparent(t) = &mut tx.kind {
            t.vin[0].asset = AssetId([4u8; 20]);
        }
        assert_eq!(
            set_fee(&mut tx, Some(10), &NATIVE_ASSET, false),
            Err(WizardError::NoFeeInput)
        );
    }

    #[test]
    fn non_native_transparent_fee_is_rejected() {
        // The pool grades a transparent transaction by its native-input
        // surplus; a fee embedded in any other asset would rank at zero.
        let token = AssetId([4u8; 20]);
        let mut tx = unsigned_transfer(1, 5_000);
        if let TransactionKind::Transparent(t) = &mut tx.kind {
            t.vin[0].asset = token;
        }
        assert_eq!(
            set_fee(&mut tx, Some(10), &token, false),
            Err(WizardError::NonNativeFee)
        );
    }

    #[test]
    fn confidential_fee_field_is_supported() {
        use umbra_core::transaction::{ConfidentialPayload, ConfidentialScript, ConfidentialTx};
        let mut tx = Transaction {
            version: 0,
            kind: TransactionKind::Confidential(ConfidentialTx {
                payloads: vec![ConfidentialPayload {
                    script: ConfidentialScript::Transfer,
                    asset: NATIVE_ASSET,
                    fee: 0,
                    ring: vec![[1u8; 32], [2u8; 32]],
                    commitments: vec![[3u8; 32], [4u8; 32]],
                    d: [5u8; 32],
                    proof: vec![0xab; 128],
                }],
            }),
        };
        let fee = set_fee(&mut tx, Some(7), &NATIVE_ASSET, false).unwrap();
        assert_eq!(fee, fees::compute_tx_fee(tx.serialized_size(), 7).unwrap());
        assert_eq!(tx.fee().unwrap(), fee);
    }

    proptest! {
        /// Across wire sizes from ~100 bytes up past 10 KB (output counts
        /// spanning 1..200) and rates 1..1000, the fixed point settles
        /// within 3 rounds and the embedded fee is exact for the final
        /// size.
        #[test]
        fn fixed_point_converges_quickly(
            outputs in 1usize..200,
            amount in 1_000u64..1_000_000,
            rate in 1u64..1_000,
        ) {
            let mut tx = unsigned_transfer(outputs, amount);
            let (fee, iterations) =
                set_fee_internal(&mut tx, Some(rate), &NATIVE_ASSET, false).unwrap();
            prop_assert!(iterations <= 3, "took {iterations} iterations");
            let required = fees::compute_tx_fee(tx.serialized_size(), rate).unwrap();
            prop_assert_eq!(fee, required);
        }
    }
}
