//! ElGamal-in-the-exponent over Ristretto: the confidential balance primitive.
//!
//! A confidential balance is a ciphertext `(L, R) = (G·b + Y·r, G·r)` for
//! balance `b`, public key `Y = G·x`, and blinding factor `r`. Ciphertexts
//! add componentwise, so balance updates compose homomorphically without
//! decryption — this is what the mempool's confidential projector relies on.
//!
//! Decryption recovers `G·b = L − R·x` and then solves a small discrete log
//! by brute force; it is only practical for small balances and is used by
//! wallet reconciliation and tests, never by the pool.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::rngs::OsRng;
use std::fmt;
use zeroize::Zeroize;

use crate::error::CryptoError;
use crate::types::KeyBytes;

/// Serialized ciphertext length: two compressed Ristretto points.
pub const CIPHERTEXT_LEN: usize = 64;

/// Decode compressed Ristretto public key bytes into a point.
pub fn decode_point(bytes: &KeyBytes) -> Result<RistrettoPoint, CryptoError> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(CryptoError::MalformedPoint)
}

/// An ElGamal ciphertext: the pair `(L, R)` of group elements.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ciphertext {
    left: RistrettoPoint,
    right: RistrettoPoint,
}

impl Ciphertext {
    /// The canonical encryption of zero under `public`: `(Y, G)`.
    ///
    /// This is the balance ciphertext of an account that has never
    /// transacted; every node synthesizes the same value from the public
    /// key alone.
    pub fn zero_balance(public: &RistrettoPoint) -> Self {
        Self { left: *public, right: RISTRETTO_BASEPOINT_POINT }
    }

    /// Encrypt `amount` under `public` with the given blinding factor.
    pub fn encrypt(amount: u64, public: &RistrettoPoint, blinding: &Scalar) -> Self {
        let g = RISTRETTO_BASEPOINT_POINT;
        Self {
            left: g * Scalar::from(amount) + public * blinding,
            right: g * blinding,
        }
    }

    /// Build a ciphertext from compressed `(C, D)` commitment bytes, as
    /// carried per ring position in a confidential payload.
    pub fn from_parts(c: &KeyBytes, d: &KeyBytes) -> Result<Self, CryptoError> {
        Ok(Self {
            left: CompressedRistretto(*c)
                .decompress()
                .ok_or(CryptoError::MalformedCiphertext)?,
            right: CompressedRistretto(*d)
                .decompress()
                .ok_or(CryptoError::MalformedCiphertext)?,
        })
    }

    /// Compressed `(C, D)` bytes of this ciphertext, as embedded per ring
    /// position in a confidential payload.
    pub fn to_parts(&self) -> (KeyBytes, KeyBytes) {
        (self.left.compress().to_bytes(), self.right.compress().to_bytes())
    }

    /// Homomorphic addition: componentwise group addition of `(L, R)`.
    pub fn add(&self, other: &Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }

    /// Additive inverse, for building equal-and-opposite adjustments.
    pub fn neg(&self) -> Self {
        Self { left: -self.left, right: -self.right }
    }

    /// Serialize as 64 bytes: compressed `L` then compressed `R`.
    pub fn serialize(&self) -> [u8; CIPHERTEXT_LEN] {
        let mut out = [0u8; CIPHERTEXT_LEN];
        out[..32].copy_from_slice(&self.left.compress().to_bytes());
        out[32..].copy_from_slice(&self.right.compress().to_bytes());
        out
    }

    /// Deserialize from 64 bytes.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != CIPHERTEXT_LEN {
            return Err(CryptoError::MalformedCiphertext);
        }
        let mut c = [0u8; 32];
        let mut d = [0u8; 32];
        c.copy_from_slice(&bytes[..32]);
        d.copy_from_slice(&bytes[32..]);
        Self::from_parts(&c, &d)
    }

    /// Recover the plaintext balance with the account secret, solving the
    /// discrete log by brute force up to `max`.
    ///
    /// Returns `None` if the balance exceeds `max`. O(max) point additions.
    pub fn decrypt_small(&self, secret: &Scalar, max: u64) -> Option<u64> {
        let target = self.left - self.right * secret;
        let g = RISTRETTO_BASEPOINT_POINT;
        let mut acc = RistrettoPoint::identity();
        for value in 0..=max {
            if acc == target {
                return Some(value);
            }
            acc += g;
        }
        None
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({})", hex::encode(self.serialize()))
    }
}

/// Keypair for a confidential account: Ristretto scalar secret and point
/// public key.
pub struct ConfidentialKeyPair {
    secret: Scalar,
    public: RistrettoPoint,
}

impl ConfidentialKeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let secret = Scalar::random(&mut OsRng);
        Self { public: RISTRETTO_BASEPOINT_POINT * secret, secret }
    }

    /// Deterministic keypair from 64 bytes of seed material.
    pub fn from_seed(seed: &[u8; 64]) -> Self {
        let secret = Scalar::from_bytes_mod_order_wide(seed);
        Self { public: RISTRETTO_BASEPOINT_POINT * secret, secret }
    }

    pub fn secret(&self) -> &Scalar {
        &self.secret
    }

    pub fn public(&self) -> &RistrettoPoint {
        &self.public
    }

    /// Compressed public key bytes, as carried in rings and payloads.
    pub fn public_bytes(&self) -> KeyBytes {
        self.public.compress().to_bytes()
    }
}

impl Drop for ConfidentialKeyPair {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

impl fmt::Debug for ConfidentialKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfidentialKeyPair({})", hex::encode(self.public_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair(seed: u8) -> ConfidentialKeyPair {
        ConfidentialKeyPair::from_seed(&[seed; 64])
    }

    #[test]
    fn zero_balance_decrypts_to_zero() {
        let kp = keypair(1);
        let ct = Ciphertext::zero_balance(kp.public());
        assert_eq!(ct.decrypt_small(kp.secret(), 10), Some(0));
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let kp = keypair(2);
        let ct = Ciphertext::encrypt(37, kp.public(), &Scalar::from(999u64));
        assert_eq!(ct.decrypt_small(kp.secret(), 100), Some(37));
    }

    #[test]
    fn decrypt_bails_past_max() {
        let kp = keypair(3);
        let ct = Ciphertext::encrypt(50, kp.public(), &Scalar::from(4u64));
        assert_eq!(ct.decrypt_small(kp.secret(), 49), None);
    }

    #[test]
    fn addition_is_homomorphic() {
        let kp = keypair(4);
        let a = Ciphertext::encrypt(30, kp.public(), &Scalar::from(5u64));
        let b = Ciphertext::encrypt(12, kp.public(), &Scalar::from(6u64));
        assert_eq!(a.add(&b).decrypt_small(kp.secret(), 100), Some(42));
    }

    #[test]
    fn neg_cancels_exactly() {
        let kp = keypair(5);
        let base = Ciphertext::encrypt(77, kp.public(), &Scalar::from(8u64));
        let delta = Ciphertext::encrypt(13, kp.public(), &Scalar::from(9u64));
        let back = base.add(&delta).add(&delta.neg());
        assert_eq!(back.decrypt_small(kp.secret(), 100), Some(77));
    }

    #[test]
    fn serialize_round_trip() {
        let kp = keypair(6);
        let ct = Ciphertext::encrypt(5, kp.public(), &Scalar::from(11u64));
        let restored = Ciphertext::deserialize(&ct.serialize()).unwrap();
        assert_eq!(restored, ct);
    }

    #[test]
    fn malformed_ciphertext_rejected() {
        assert_eq!(
            Ciphertext::deserialize(&[0u8; 10]),
            Err(CryptoError::MalformedCiphertext)
        );
        // 64 bytes that are not valid compressed points.
        assert_eq!(
            Ciphertext::deserialize(&[0xffu8; 64]),
            Err(CryptoError::MalformedCiphertext)
        );
    }
}
