//! # Cryptographic Seam
//!
//! Hashing and signing for the Trellis core, consumed everywhere else as an
//! opaque oracle: `hash(bytes) -> Digest`, `sign(key, bytes) -> Signature`,
//! `verify(pubkey, signature, bytes) -> bool`. The core requires exactly two
//! properties of this module — hashing is a pure function of its input, and
//! `verify(pk, sign(sk, m), m)` holds for any matching keypair — and nothing
//! more. Algorithm choices live here and only here.

pub mod hash;
pub mod keys;

pub use hash::{batch_digest, double_sha256, hash, hash_parts, hash_with_domain, Digest};
pub use keys::{KeyError, TrellisKeypair, TrellisPublicKey, TrellisSignature};
