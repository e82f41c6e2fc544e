//! # Key Management
//!
//! Ed25519 keypair generation and signing for Trellis identities.
//!
//! The signing primitive is deliberately boring: deterministic signatures,
//! 32-byte keys, 64-byte signatures, audited constant-time implementations.
//! The core consumes it as an oracle — `sign(key, bytes)` and
//! `verify(pubkey, signature, bytes)` — and nothing downstream depends on
//! which scheme sits behind those two calls. A deployment that wants a
//! post-quantum scheme swaps this module and re-keys; the ledger, router,
//! and consensus engine never notice.
//!
//! Private keys are never logged. If you add logging to this module, you
//! will be asked to leave.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors from key material handling.
///
/// Intentionally vague about *why* something failed — leaking details about
/// key material through error messages is a classic footgun.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

// ---------------------------------------------------------------------------
// TrellisKeypair
// ---------------------------------------------------------------------------

/// A signing identity: the Ed25519 keypair of a node or account holder.
///
/// Does NOT implement `Serialize` — exporting a private key should be a
/// deliberate act (`secret_key_bytes`), not something that happens because
/// a keypair ended up inside a JSON response.
pub struct TrellisKeypair {
    signing_key: SigningKey,
}

impl TrellisKeypair {
    /// Generates a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// In Ed25519 the secret key *is* the seed. Useful for test fixtures
    /// and for deriving node identities from KDF output. A weak seed makes
    /// a weak key — feed this a CSPRNG or a proper KDF, nothing else.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Returns the public half of this identity.
    pub fn public_key(&self) -> TrellisPublicKey {
        TrellisPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Signs a message. Deterministic for a given (key, message) pair.
    pub fn sign(&self, message: &[u8]) -> TrellisSignature {
        TrellisSignature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Verifies a signature against this keypair's public key.
    pub fn verify(&self, message: &[u8], signature: &TrellisSignature) -> bool {
        self.public_key().verify(message, signature)
    }

    /// Exports the raw secret key. Handle with extreme care — this is the
    /// only secret between an attacker and the associated identity.
    pub fn secret_key_bytes(&self) -> [u8; SECRET_KEY_LENGTH] {
        self.signing_key.to_bytes()
    }
}

impl Clone for TrellisKeypair {
    /// Cloning a keypair is allowed but should make you uncomfortable.
    /// Every copy of a private key is another thing to protect.
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for TrellisKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material, not even "partially".
        write!(f, "TrellisKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// TrellisPublicKey
// ---------------------------------------------------------------------------

/// The public half of an identity, safe to share with the world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrellisPublicKey {
    bytes: [u8; PUBLIC_KEY_LENGTH],
}

impl TrellisPublicKey {
    /// Wraps raw bytes without curve validation. Verification with an
    /// off-curve key simply returns `false`, so deferring the point check
    /// to use time is safe.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Parses and validates a public key from a byte slice.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Raw bytes accessor.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.bytes
    }

    /// Verifies an Ed25519 signature over `message`.
    ///
    /// Any failure — malformed key, malformed signature, wrong message —
    /// is a plain `false`. No panics, no error taxonomy, just a boolean,
    /// because callers at this layer have exactly one decision to make.
    pub fn verify(&self, message: &[u8], signature: &TrellisSignature) -> bool {
        let Ok(vk) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let sig = DalekSignature::from_bytes(&signature.bytes);
        vk.verify(message, &sig).is_ok()
    }

    /// Hex encoding for logs and display.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for TrellisPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrellisPublicKey({}…)", &self.to_hex()[..8])
    }
}

impl fmt::Display for TrellisPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// TrellisSignature
// ---------------------------------------------------------------------------

/// An Ed25519 signature. 64 bytes, deterministic, no nonce management,
/// no k-value disasters.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrellisSignature {
    #[serde(with = "serde_sig_bytes")]
    bytes: [u8; SIGNATURE_LENGTH],
}

impl TrellisSignature {
    /// Wraps raw signature bytes.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Raw bytes accessor.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }
}

impl fmt::Debug for TrellisSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TrellisSignature({}…)", &hex::encode(&self.bytes[..4]))
    }
}

/// Serde helper: serialize the 64-byte signature as a byte sequence.
/// `[u8; 64]` exceeds serde's built-in array impls, so we go through a Vec.
mod serde_sig_bytes {
    use super::SIGNATURE_LENGTH;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8; SIGNATURE_LENGTH],
        ser: S,
    ) -> Result<S::Ok, S::Error> {
        ser.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> Result<[u8; SIGNATURE_LENGTH], D::Error> {
        let v: Vec<u8> = Vec::deserialize(de)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("signature must be exactly 64 bytes"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_roundtrip() {
        let kp = TrellisKeypair::generate();
        let msg = b"settle 100 grains to shard 7";
        let sig = kp.sign(msg);
        assert!(kp.verify(msg, &sig));
    }

    #[test]
    fn wrong_message_fails_verification() {
        let kp = TrellisKeypair::generate();
        let sig = kp.sign(b"original");
        assert!(!kp.verify(b"tampered", &sig));
    }

    #[test]
    fn wrong_key_fails_verification() {
        let alice = TrellisKeypair::generate();
        let mallory = TrellisKeypair::generate();
        let sig = alice.sign(b"message");
        assert!(!mallory.public_key().verify(b"message", &sig));
    }

    #[test]
    fn from_seed_is_deterministic() {
        let a = TrellisKeypair::from_seed(&[7u8; 32]);
        let b = TrellisKeypair::from_seed(&[7u8; 32]);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"m").as_bytes(), b.sign(b"m").as_bytes());
    }

    #[test]
    fn signatures_are_deterministic() {
        let kp = TrellisKeypair::from_seed(&[1u8; 32]);
        assert_eq!(kp.sign(b"twice").as_bytes(), kp.sign(b"twice").as_bytes());
    }

    #[test]
    fn debug_never_prints_secret() {
        let kp = TrellisKeypair::from_seed(&[9u8; 32]);
        let debug = format!("{:?}", kp);
        let secret_hex = hex::encode(kp.secret_key_bytes());
        assert!(!debug.contains(&secret_hex));
    }

    #[test]
    fn try_from_slice_rejects_bad_lengths() {
        assert!(TrellisPublicKey::try_from_slice(&[0u8; 31]).is_err());
        assert!(TrellisPublicKey::try_from_slice(&[0u8; 33]).is_err());
    }

    #[test]
    fn signature_serde_roundtrip() {
        let kp = TrellisKeypair::from_seed(&[3u8; 32]);
        let sig = kp.sign(b"persist me");
        let json = serde_json::to_string(&sig).expect("serialize");
        let back: TrellisSignature = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(sig, back);
    }
}
