//! Protocol constants. All monetary values in umbrals (1 UMB = 10^8 umbrals).

use crate::types::AssetId;

pub const COIN: u64 = 100_000_000;

/// The native staking asset (all-zero asset id).
pub const NATIVE_ASSET: AssetId = AssetId([0u8; 20]);

/// Default fee rate for the native asset, in umbrals per serialized byte.
pub const FEE_PER_BYTE_NATIVE: u64 = 10;

/// Maximum delegated-staking fee a forger may claim in a block, in umbrals.
pub const STAKING_FEE_MAX: u64 = 10 * COIN;

/// Upper bound on the fee wizard's fixed-point iterations.
///
/// Varint width changes converge in two rounds in practice; exceeding this
/// bound indicates a size/fee coupling bug, not bad input.
pub const MAX_FEE_ITERATIONS: u32 = 10;

/// Maximum accepted length for variable-length byte fields on the wire.
pub const MAX_WIRE_FIELD_LEN: usize = 1 << 20;

/// Maximum ring size for a confidential payload.
pub const MAX_RING_SIZE: usize = 256;
