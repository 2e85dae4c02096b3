//! Blocks and their three serializations.
//!
//! A proof-of-stake block is hashed three ways:
//! - **kernel hash** — only the fields that decide forging eligibility
//!   (prev kernel hash, timestamp, forger key); excludes the merkle hash,
//!   prev hash, staking amount, and staking fee, so a forger can test
//!   eligibility before assembling the block body.
//! - **signing hash** — everything except the forger signature.
//! - **block hash** — the full wire form, including the signature.
//!
//! The field subsets mirror [`Block::advanced_serialization`]; the forging
//! loop and the mempool's candidate snapshots agree on these exact bytes.

use crate::codec::{BufferReader, BufferWriter};
use crate::constants::STAKING_FEE_MAX;
use crate::error::BlockError;
use crate::types::{Hash256, KeyBytes};

/// Fixed header fields present in every serialization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub version: u64,
    pub height: u64,
}

impl BlockHeader {
    fn serialize(&self, w: &mut BufferWriter) {
        w.write_uvarint(self.version);
        w.write_uvarint(self.height);
    }

    fn read(r: &mut BufferReader<'_>) -> Result<Self, BlockError> {
        Ok(Self {
            version: r.read_uvarint().map_err(BlockError::Serialization)?,
            height: r.read_uvarint().map_err(BlockError::Serialization)?,
        })
    }
}

/// A proof-of-stake block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    /// Merkle root over the included transaction identity hashes.
    pub merkle_hash: Hash256,
    /// Hash of the previous block (full form).
    pub prev_hash: Hash256,
    /// Kernel hash of the previous block.
    pub prev_kernel_hash: Hash256,
    /// Unix timestamp, seconds.
    pub timestamp: u64,
    /// Stake backing this block's forging attempt, in umbrals.
    pub staking_amount: u64,
    /// Public key of the forging (staking) account.
    pub forger_public_key: KeyBytes,
    /// Delegated-staking fee claimed by the forger, in umbrals.
    pub staking_fee: u64,
    /// Ed25519 signature by the forger over the signing hash. All zeros
    /// until signed.
    pub forger_signature: [u8; 64],
}

impl Block {
    /// Field-selective serialization shared by all three forms.
    ///
    /// `kernel_hash` restricts output to forging-relevant fields;
    /// `incl_signature` appends the forger signature (full wire form only).
    pub fn advanced_serialization(&self, w: &mut BufferWriter, kernel_hash: bool, incl_signature: bool) {
        self.header.serialize(w);

        if !kernel_hash {
            w.write_bytes(self.merkle_hash.as_bytes());
            w.write_bytes(self.prev_hash.as_bytes());
        }

        w.write_bytes(self.prev_kernel_hash.as_bytes());

        if !kernel_hash {
            w.write_uvarint(self.staking_amount);
        }

        w.write_uvarint(self.timestamp);
        w.write_bytes(&self.forger_public_key);

        if !kernel_hash {
            w.write_uvarint(self.staking_fee);
        }

        if incl_signature {
            w.write_bytes(&self.forger_signature);
        }
    }

    /// Kernel hash: BLAKE3 over the forging-relevant field subset.
    pub fn kernel_hash(&self) -> Hash256 {
        let mut w = BufferWriter::new();
        self.advanced_serialization(&mut w, true, false);
        Hash256(blake3::hash(&w.into_bytes()).into())
    }

    /// Signing hash: BLAKE3 over all fields except the signature.
    pub fn signing_hash(&self) -> Hash256 {
        let mut w = BufferWriter::new();
        self.advanced_serialization(&mut w, false, false);
        Hash256(blake3::hash(&w.into_bytes()).into())
    }

    /// Block hash: BLAKE3 over the full wire serialization.
    pub fn hash(&self) -> Hash256 {
        Hash256(blake3::hash(&self.serialize_wire()).into())
    }

    /// Full wire serialization, signature included.
    pub fn serialize_wire(&self) -> Vec<u8> {
        let mut w = BufferWriter::new();
        self.advanced_serialization(&mut w, false, true);
        w.into_bytes()
    }

    /// Deserialize the full wire form, rejecting trailing garbage.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, BlockError> {
        let mut r = BufferReader::new(bytes);
        let header = BlockHeader::read(&mut r)?;
        let merkle_hash = Hash256(r.read_array32().map_err(BlockError::Serialization)?);
        let prev_hash = Hash256(r.read_array32().map_err(BlockError::Serialization)?);
        let prev_kernel_hash = Hash256(r.read_array32().map_err(BlockError::Serialization)?);
        let staking_amount = r.read_uvarint().map_err(BlockError::Serialization)?;
        let timestamp = r.read_uvarint().map_err(BlockError::Serialization)?;
        let forger_public_key = r.read_array32().map_err(BlockError::Serialization)?;
        let staking_fee = r.read_uvarint().map_err(BlockError::Serialization)?;
        let mut forger_signature = [0u8; 64];
        forger_signature
            .copy_from_slice(r.read_bytes(64).map_err(BlockError::Serialization)?);
        r.finish().map_err(BlockError::Serialization)?;
        Ok(Self {
            header,
            merkle_hash,
            prev_hash,
            prev_kernel_hash,
            timestamp,
            staking_amount,
            forger_public_key,
            staking_fee,
            forger_signature,
        })
    }

    /// Structural validation of forger-controlled fields.
    pub fn validate(&self) -> Result<(), BlockError> {
        if self.staking_fee > STAKING_FEE_MAX {
            return Err(BlockError::StakingFeeTooHigh {
                got: self.staking_fee,
                max: STAKING_FEE_MAX,
            });
        }
        Ok(())
    }
}

/// Merkle-style aggregation over transaction identity hashes.
///
/// Sequential BLAKE3 chain rather than a binary tree; the pool and forger
/// only need a deterministic commitment to the ordered candidate list.
pub fn transactions_merkle(hashes: &[Hash256]) -> Hash256 {
    let mut hasher = blake3::Hasher::new();
    for hash in hashes {
        hasher.update(hash.as_bytes());
    }
    Hash256(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            header: BlockHeader { version: 0, height: 42 },
            merkle_hash: Hash256([1u8; 32]),
            prev_hash: Hash256([2u8; 32]),
            prev_kernel_hash: Hash256([3u8; 32]),
            timestamp: 1_700_000_000,
            staking_amount: 5_000_000,
            forger_public_key: [4u8; 32],
            staking_fee: 100,
            forger_signature: [0u8; 64],
        }
    }

    #[test]
    fn wire_round_trip() {
        let block = sample_block();
        let restored = Block::deserialize(&block.serialize_wire()).unwrap();
        assert_eq!(restored, block);
    }

    #[test]
    fn kernel_hash_ignores_body_fields() {
        let block = sample_block();
        let kernel = block.kernel_hash();

        let mut changed = block.clone();
        changed.merkle_hash = Hash256([9u8; 32]);
        changed.prev_hash = Hash256([9u8; 32]);
        changed.staking_amount = 1;
        changed.staking_fee = 0;
        assert_eq!(changed.kernel_hash(), kernel);

        // But the timestamp is kernel-relevant.
        changed.timestamp += 1;
        assert_ne!(changed.kernel_hash(), kernel);
    }

    #[test]
    fn signing_hash_ignores_only_signature() {
        let block = sample_block();
        let signing = block.signing_hash();

        let mut signed = block.clone();
        signed.forger_signature = [7u8; 64];
        assert_eq!(signed.signing_hash(), signing);
        assert_ne!(signed.hash(), block.hash());

        let mut changed = block.clone();
        changed.merkle_hash = Hash256([9u8; 32]);
        assert_ne!(changed.signing_hash(), signing);
    }

    #[test]
    fn staking_fee_bound_enforced() {
        let mut block = sample_block();
        block.staking_fee = STAKING_FEE_MAX + 1;
        assert!(matches!(
            block.validate(),
            Err(BlockError::StakingFeeTooHigh { .. })
        ));
    }

    #[test]
    fn merkle_is_order_sensitive() {
        let a = Hash256([1u8; 32]);
        let b = Hash256([2u8; 32]);
        assert_ne!(transactions_merkle(&[a, b]), transactions_merkle(&[b, a]));
        assert_eq!(transactions_merkle(&[a, b]), transactions_merkle(&[a, b]));
    }
}
