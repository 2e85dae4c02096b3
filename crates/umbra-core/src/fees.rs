//! Fee schedule: umbrals-per-byte rates and the total-fee rule.

use crate::constants::FEE_PER_BYTE_NATIVE;
use crate::error::TransactionError;
use crate::types::AssetId;

/// Fee rate for paying fees in the given asset, in umbrals per byte.
///
/// Returns 0 for assets with no published rate; transactions paying fees in
/// such an asset will most likely not be accepted by other forgers.
pub fn fee_per_byte(asset: &AssetId) -> u64 {
    if asset.is_native() { FEE_PER_BYTE_NATIVE } else { 0 }
}

/// Required total fee for a transaction of `size` serialized bytes at
/// `rate` umbrals per byte.
pub fn compute_tx_fee(size: u64, rate: u64) -> Result<u64, TransactionError> {
    size.checked_mul(rate).ok_or(TransactionError::ValueOverflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::NATIVE_ASSET;

    #[test]
    fn native_rate_is_published() {
        assert_eq!(fee_per_byte(&NATIVE_ASSET), FEE_PER_BYTE_NATIVE);
        assert_eq!(fee_per_byte(&AssetId([7u8; 20])), 0);
    }

    #[test]
    fn fee_is_linear_in_size() {
        assert_eq!(compute_tx_fee(100, 10).unwrap(), 1_000);
        assert_eq!(compute_tx_fee(0, 10).unwrap(), 0);
    }

    #[test]
    fn fee_overflow_is_an_error() {
        assert_eq!(compute_tx_fee(u64::MAX, 2), Err(TransactionError::ValueOverflow));
    }
}
