//! Dual-representation transactions: transparent and confidential.
//!
//! A [`Transaction`] is a closed tagged variant: a small envelope (version +
//! kind tag) over either a [`TransparentTx`] (plaintext u64 amounts,
//! nonce-ordered account model) or a [`ConfidentialTx`] (ElGamal ciphertext
//! amounts, ring-hidden senders). Pool algorithms dispatch on the tag through
//! the kind-checked accessors; there are no unchecked downcasts.
//!
//! # Wire format
//!
//! Serialization goes through the varint codec so that encoded integer
//! widths track their values — the fee wizard's size estimates are exact
//! wire sizes. Transparent input signatures are fixed-width (64 zero bytes
//! before signing), so signing never changes the serialized size.
//!
//! Three serializations exist:
//! - **wire**: everything, including signatures; hashed for identity
//! - **signing**: everything except transparent input signatures
//! - both hashes are BLAKE3 over the respective byte strings

use crate::codec::{BufferReader, BufferWriter};
use crate::constants::MAX_RING_SIZE;
use crate::error::{CodecError, TransactionError};
use crate::types::{AssetId, Hash256, KeyBytes};

/// Script kinds for transparent transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransparentScript {
    /// Plain value transfer.
    Transfer,
    /// Withdraw staked funds back to the available balance.
    Unstake,
    /// Delegate stake to a forging key.
    Delegate,
}

impl TransparentScript {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Transfer => 0,
            Self::Unstake => 1,
            Self::Delegate => 2,
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Self::Transfer),
            1 => Ok(Self::Unstake),
            2 => Ok(Self::Delegate),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

/// Script kinds for confidential payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidentialScript {
    /// Ring-hidden confidential transfer.
    Transfer,
    /// Move confidential funds into stake.
    Stake,
    /// Move staked funds back into a confidential balance.
    Unstake,
}

impl ConfidentialScript {
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Transfer => 0,
            Self::Stake => 1,
            Self::Unstake => 2,
        }
    }

    pub fn from_u8(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0 => Ok(Self::Transfer),
            1 => Ok(Self::Stake),
            2 => Ok(Self::Unstake),
            other => Err(CodecError::InvalidTag(other)),
        }
    }
}

/// A transparent input: the account spending, the amount, and its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparentInput {
    /// Amount debited from the account, in asset units. Includes the fee
    /// share when this input's asset is the fee asset.
    pub amount: u64,
    /// Ed25519 public key of the spending account.
    pub public_key: KeyBytes,
    /// Asset being spent.
    pub asset: AssetId,
    /// Ed25519 signature over the signing hash. All zeros before signing.
    pub signature: [u8; 64],
}

/// A transparent output crediting a recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparentOutput {
    /// Amount credited, in asset units.
    pub amount: u64,
    /// BLAKE3 hash of the recipient's public key.
    pub public_key_hash: Hash256,
    /// Asset being credited.
    pub asset: AssetId,
}

/// Script-specific extra data for transparent transactions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransparentExtra {
    #[default]
    None,
    Unstake {
        /// Amount withdrawn from stake.
        unstake_amount: u64,
        /// Fee debited from the staked balance instead of a fee input.
        /// Zero unless the pay-fee-in-extra wizard mode was used.
        fee_extra: u64,
    },
    Delegate {
        /// Amount moved into delegated stake.
        delegate_amount: u64,
        /// Replacement forging key, if the delegator is rotating it.
        new_public_key: Option<KeyBytes>,
    },
}

/// A transparent transaction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransparentTx {
    pub script: TransparentScript,
    /// Account-model sequence number of the first input's account.
    pub nonce: u64,
    pub vin: Vec<TransparentInput>,
    pub vout: Vec<TransparentOutput>,
    pub extra: TransparentExtra,
}

/// One confidential payload: a ring-hidden balance update for one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidentialPayload {
    pub script: ConfidentialScript,
    pub asset: AssetId,
    /// Declared fee in umbrals; the only plaintext amount in the payload.
    pub fee: u64,
    /// Anonymity set: compressed Ristretto public keys the sender and
    /// receiver hide among.
    pub ring: Vec<KeyBytes>,
    /// Per-ring-position commitment `C[i]`; pairs with the shared `d` to
    /// form the ElGamal delta applied to position `i`'s balance.
    pub commitments: Vec<KeyBytes>,
    /// Shared second ciphertext component `D`.
    pub d: KeyBytes,
    /// Opaque range/validity proof. Verified by the consensus layer, not
    /// the pool.
    pub proof: Vec<u8>,
}

/// A confidential transaction body: one or more payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfidentialTx {
    pub payloads: Vec<ConfidentialPayload>,
}

/// The kind tag and body of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionKind {
    Transparent(TransparentTx),
    Confidential(ConfidentialTx),
}

impl TransactionKind {
    fn tag(&self) -> u8 {
        match self {
            Self::Transparent(_) => 0,
            Self::Confidential(_) => 1,
        }
    }
}

/// A transaction: version envelope plus kind-tagged body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u64,
    pub kind: TransactionKind,
}

impl Transaction {
    /// Kind-checked accessor for the transparent body.
    pub fn as_transparent(&self) -> Option<&TransparentTx> {
        match &self.kind {
            TransactionKind::Transparent(tx) => Some(tx),
            TransactionKind::Confidential(_) => None,
        }
    }

    /// Kind-checked accessor for the confidential body.
    pub fn as_confidential(&self) -> Option<&ConfidentialTx> {
        match &self.kind {
            TransactionKind::Confidential(tx) => Some(tx),
            TransactionKind::Transparent(_) => None,
        }
    }

    pub fn is_transparent(&self) -> bool {
        matches!(self.kind, TransactionKind::Transparent(_))
    }

    /// Sender public key for transparent transactions (first input's key).
    pub fn sender_key(&self) -> Option<&KeyBytes> {
        self.as_transparent()
            .and_then(|tx| tx.vin.first())
            .map(|vin| &vin.public_key)
    }

    /// Declared nonce for transparent transactions.
    pub fn nonce(&self) -> Option<u64> {
        self.as_transparent().map(|tx| tx.nonce)
    }

    /// Serialize to wire bytes, including signatures.
    pub fn serialize_wire(&self) -> Vec<u8> {
        self.serialize_to_bytes(true)
    }

    /// Serialize for signing: everything except input signatures.
    pub fn serialize_for_signing(&self) -> Vec<u8> {
        self.serialize_to_bytes(false)
    }

    fn serialize_to_bytes(&self, incl_signatures: bool) -> Vec<u8> {
        let mut w = BufferWriter::new();
        self.serialize(&mut w, incl_signatures);
        w.into_bytes()
    }

    fn serialize(&self, w: &mut BufferWriter, incl_signatures: bool) {
        w.write_uvarint(self.version);
        w.write_u8(self.kind.tag());
        match &self.kind {
            TransactionKind::Transparent(tx) => tx.serialize(w, incl_signatures),
            TransactionKind::Confidential(tx) => tx.serialize(w),
        }
    }

    /// Wire size in bytes. This is the size the fee schedule prices.
    pub fn serialized_size(&self) -> u64 {
        self.serialize_wire().len() as u64
    }

    /// Identity hash: BLAKE3 over the full wire serialization.
    pub fn identity_hash(&self) -> Hash256 {
        Hash256(blake3::hash(&self.serialize_wire()).into())
    }

    /// Signing hash: BLAKE3 over the signature-free serialization.
    pub fn signing_hash(&self) -> Hash256 {
        Hash256(blake3::hash(&self.serialize_for_signing()).into())
    }

    /// Deserialize from wire bytes, rejecting trailing garbage.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, TransactionError> {
        let mut r = BufferReader::new(bytes);
        let tx = Self::read(&mut r)?;
        r.finish()?;
        Ok(tx)
    }

    fn read(r: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        let version = r.read_uvarint()?;
        let kind = match r.read_u8()? {
            0 => TransactionKind::Transparent(TransparentTx::read(r)?),
            1 => TransactionKind::Confidential(ConfidentialTx::read(r)?),
            other => return Err(CodecError::InvalidTag(other)),
        };
        Ok(Self { version, kind })
    }

    /// Total declared fee in umbrals.
    ///
    /// Transparent: native inputs (plus any unstake fee-extra) minus native
    /// outputs. Confidential: sum of declared payload fees.
    pub fn fee(&self) -> Result<u64, TransactionError> {
        match &self.kind {
            TransactionKind::Transparent(tx) => tx.fee(),
            TransactionKind::Confidential(tx) => {
                let mut total: u64 = 0;
                for payload in &tx.payloads {
                    total = total
                        .checked_add(payload.fee)
                        .ok_or(TransactionError::ValueOverflow)?;
                }
                Ok(total)
            }
        }
    }

    /// Structural validation: shape constraints only, no signature or proof
    /// verification (that is the consensus layer's job).
    pub fn validate_structure(&self) -> Result<(), TransactionError> {
        match &self.kind {
            TransactionKind::Transparent(tx) => tx.validate_structure(),
            TransactionKind::Confidential(tx) => tx.validate_structure(),
        }
    }
}

impl TransparentTx {
    fn serialize(&self, w: &mut BufferWriter, incl_signatures: bool) {
        w.write_u8(self.script.to_u8());
        w.write_uvarint(self.nonce);
        w.write_uvarint(self.vin.len() as u64);
        for vin in &self.vin {
            w.write_uvarint(vin.amount);
            w.write_bytes(&vin.public_key);
            w.write_bytes(vin.asset.as_bytes());
            if incl_signatures {
                w.write_bytes(&vin.signature);
            }
        }
        w.write_uvarint(self.vout.len() as u64);
        for vout in &self.vout {
            w.write_uvarint(vout.amount);
            w.write_bytes(vout.public_key_hash.as_bytes());
            w.write_bytes(vout.asset.as_bytes());
        }
        match &self.extra {
            TransparentExtra::None => {}
            TransparentExtra::Unstake { unstake_amount, fee_extra } => {
                w.write_uvarint(*unstake_amount);
                w.write_uvarint(*fee_extra);
            }
            TransparentExtra::Delegate { delegate_amount, new_public_key } => {
                w.write_uvarint(*delegate_amount);
                match new_public_key {
                    Some(key) => {
                        w.write_u8(1);
                        w.write_bytes(key);
                    }
                    None => w.write_u8(0),
                }
            }
        }
    }

    fn read(r: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        let script = TransparentScript::from_u8(r.read_u8()?)?;
        let nonce = r.read_uvarint()?;
        let vin_len = r.read_uvarint()? as usize;
        let mut vin = Vec::with_capacity(vin_len.min(1024));
        for _ in 0..vin_len {
            let amount = r.read_uvarint()?;
            let public_key = r.read_array32()?;
            let asset = AssetId(r.read_array20()?);
            let mut signature = [0u8; 64];
            signature.copy_from_slice(r.read_bytes(64)?);
            vin.push(TransparentInput { amount, public_key, asset, signature });
        }
        let vout_len = r.read_uvarint()? as usize;
        let mut vout = Vec::with_capacity(vout_len.min(1024));
        for _ in 0..vout_len {
            let amount = r.read_uvarint()?;
            let public_key_hash = Hash256(r.read_array32()?);
            let asset = AssetId(r.read_array20()?);
            vout.push(TransparentOutput { amount, public_key_hash, asset });
        }
        let extra = match script {
            TransparentScript::Transfer => TransparentExtra::None,
            TransparentScript::Unstake => TransparentExtra::Unstake {
                unstake_amount: r.read_uvarint()?,
                fee_extra: r.read_uvarint()?,
            },
            TransparentScript::Delegate => TransparentExtra::Delegate {
                delegate_amount: r.read_uvarint()?,
                new_public_key: match r.read_u8()? {
                    0 => None,
                    1 => Some(r.read_array32()?),
                    other => return Err(CodecError::InvalidTag(other)),
                },
            },
        };
        Ok(Self { script, nonce, vin, vout, extra })
    }

    fn fee(&self) -> Result<u64, TransactionError> {
        let mut inputs: u64 = match &self.extra {
            TransparentExtra::Unstake { fee_extra, .. } => *fee_extra,
            _ => 0,
        };
        for vin in &self.vin {
            if vin.asset.is_native() {
                inputs = inputs
                    .checked_add(vin.amount)
                    .ok_or(TransactionError::ValueOverflow)?;
            }
        }
        let mut outputs: u64 = 0;
        for vout in &self.vout {
            if vout.asset.is_native() {
                outputs = outputs
                    .checked_add(vout.amount)
                    .ok_or(TransactionError::ValueOverflow)?;
            }
        }
        inputs
            .checked_sub(outputs)
            .ok_or_else(|| TransactionError::OutputsExceedInputs("native".into()))
    }

    fn validate_structure(&self) -> Result<(), TransactionError> {
        if self.vin.is_empty() {
            return Err(TransactionError::EmptyInputsOrOutputs);
        }
        match (self.script, &self.extra) {
            (TransparentScript::Transfer, TransparentExtra::None) => {
                if self.vout.is_empty() {
                    return Err(TransactionError::EmptyInputsOrOutputs);
                }
            }
            (TransparentScript::Unstake, TransparentExtra::Unstake { .. })
            | (TransparentScript::Delegate, TransparentExtra::Delegate { .. }) => {
                if self.vin.len() != 1 {
                    return Err(TransactionError::InvalidScriptShape {
                        script: format!("{:?}", self.script),
                        expected: "exactly one input".into(),
                    });
                }
            }
            _ => {
                return Err(TransactionError::InvalidScriptShape {
                    script: format!("{:?}", self.script),
                    expected: "matching extra data".into(),
                });
            }
        }
        // Per-asset conservation: outputs must not exceed inputs.
        self.fee()?;
        Ok(())
    }
}

impl ConfidentialTx {
    fn serialize(&self, w: &mut BufferWriter) {
        w.write_uvarint(self.payloads.len() as u64);
        for payload in &self.payloads {
            w.write_u8(payload.script.to_u8());
            w.write_bytes(payload.asset.as_bytes());
            w.write_uvarint(payload.fee);
            w.write_uvarint(payload.ring.len() as u64);
            for key in &payload.ring {
                w.write_bytes(key);
            }
            for commitment in &payload.commitments {
                w.write_bytes(commitment);
            }
            w.write_bytes(&payload.d);
            w.write_var_bytes(&payload.proof);
        }
    }

    fn read(r: &mut BufferReader<'_>) -> Result<Self, CodecError> {
        let payload_len = r.read_uvarint()? as usize;
        let mut payloads = Vec::with_capacity(payload_len.min(64));
        for _ in 0..payload_len {
            let script = ConfidentialScript::from_u8(r.read_u8()?)?;
            let asset = AssetId(r.read_array20()?);
            let fee = r.read_uvarint()?;
            let ring_len = r.read_uvarint()? as usize;
            if ring_len > MAX_RING_SIZE {
                return Err(CodecError::InvalidLength { got: ring_len, max: MAX_RING_SIZE });
            }
            let mut ring = Vec::with_capacity(ring_len);
            for _ in 0..ring_len {
                ring.push(r.read_array32()?);
            }
            let mut commitments = Vec::with_capacity(ring_len);
            for _ in 0..ring_len {
                commitments.push(r.read_array32()?);
            }
            let d = r.read_array32()?;
            let proof = r.read_var_bytes()?;
            payloads.push(ConfidentialPayload { script, asset, fee, ring, commitments, d, proof });
        }
        Ok(Self { payloads })
    }

    fn validate_structure(&self) -> Result<(), TransactionError> {
        if self.payloads.is_empty() {
            return Err(TransactionError::EmptyPayloads);
        }
        for payload in &self.payloads {
            if payload.ring.is_empty() || payload.ring.len() != payload.commitments.len() {
                return Err(TransactionError::RingCommitmentMismatch {
                    ring: payload.ring.len(),
                    commitments: payload.commitments.len(),
                });
            }
        }
        Ok(())
    }
}
