//! Error types for the Umbra protocol.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input at offset {0}")] UnexpectedEof(usize),
    #[error("varint longer than 10 bytes")] VarintOverflow,
    #[error("invalid tag byte: {0}")] InvalidTag(u8),
    #[error("invalid length: {got} (max {max})")] InvalidLength { got: usize, max: usize },
    #[error("{0} trailing bytes after deserialization")] TrailingBytes(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("malformed ciphertext")] MalformedCiphertext,
    #[error("malformed curve point")] MalformedPoint,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("empty inputs or outputs")] EmptyInputsOrOutputs,
    #[error("empty payload list")] EmptyPayloads,
    #[error("ring size {ring} does not match commitment count {commitments}")] RingCommitmentMismatch { ring: usize, commitments: usize },
    #[error("value overflow")] ValueOverflow,
    #[error("outputs exceed inputs for asset {0}")] OutputsExceedInputs(String),
    #[error("script {script} requires {expected}")] InvalidScriptShape { script: String, expected: String },
    #[error("serialization: {0}")] Serialization(#[from] CodecError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("staking fee {got} exceeds maximum {max}")] StakingFeeTooHigh { got: u64, max: u64 },
    #[error("serialization: {0}")] Serialization(#[from] CodecError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MempoolError {
    #[error("nonce {nonce} already claimed by pending tx {existing}")] DuplicateNonce { nonce: u64, existing: String },
    #[error("insufficient projected balance: available {available}, pending spend {required}")] InsufficientProjected { available: u64, required: u64 },
    #[error("projection cancelled")] Cancelled,
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error("internal: {0}")] Internal(String),
}

#[derive(Error, Debug)]
pub enum UmbraError {
    #[error(transparent)] Codec(#[from] CodecError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Block(#[from] BlockError),
    #[error(transparent)] Mempool(#[from] MempoolError),
}
