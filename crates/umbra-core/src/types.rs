//! Foundation types: hashes, asset ids, transparent key material.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte hash value.
///
/// Used for transaction identity hashes, signing hashes, and block
/// kernel/signing hashes. All hashes are BLAKE3.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash (32 zero bytes). Used as the pre-genesis tip marker.
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// First four bytes as lowercase hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// A 20-byte asset identifier.
///
/// The all-zero id is the native staking asset
/// ([`NATIVE_ASSET`](crate::constants::NATIVE_ASSET)); other ids name
/// user-issued assets.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct AssetId(pub [u8; 20]);

impl AssetId {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Whether this is the native staking asset.
    pub fn is_native(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            f.write_str("native")
        } else {
            f.write_str(&hex::encode(self.0))
        }
    }
}

/// Raw 32-byte public key bytes identifying a transparent account
/// (Ed25519) or a confidential account (compressed Ristretto).
///
/// Kept as plain bytes at the protocol layer; the `crypto` and `elgamal`
/// modules decode into typed keys where arithmetic is needed.
pub type KeyBytes = [u8; 32];
