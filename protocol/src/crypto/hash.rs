//! # Digests and Hashing
//!
//! The cryptographic hash seam of the protocol. Everything that needs an
//! identity — transactions, ledger-graph nodes, partition state, consensus
//! batches — gets it from the functions in this module, and nowhere else.
//! The rest of the core treats hashing as an oracle: deterministic bytes in,
//! [`Digest`] out, no opinions about the algorithm behind it.
//!
//! - **BLAKE3** — the primary hash. Fast on every platform, parallelizable,
//!   and resistant to length extension by construction. Used for every
//!   Trellis-native identifier.
//! - **SHA-256** — kept solely for foreign-chain compatibility. Bitcoin and
//!   friends chose it in 2009 and the ecosystem is stuck with it; the
//!   [`double_sha256`](crate::crypto::hash::double_sha256) construction
//!   reproduces their transaction-id convention for bridge references.
//!
//! Swapping the algorithm means editing this file and re-genesis-ing the
//! network. There is deliberately no trait indirection on the hot path —
//! the oracle seam is the module boundary, not a vtable.

use serde::{Deserialize, Serialize};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;

use crate::config::DIGEST_LENGTH;

// ---------------------------------------------------------------------------
// Digest
// ---------------------------------------------------------------------------

/// A 32-byte opaque identifier produced by the hash oracle.
///
/// Used as ledger-node id, transaction id, state digest, and map key
/// throughout the core. Equality is byte equality. The all-zero digest is
/// the sentinel meaning "no parent / no value" — it is never a legitimate
/// hash output in practice, and the code never relies on that being
/// cryptographically impossible, only on nobody constructing it by hand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Digest(pub [u8; DIGEST_LENGTH]);

impl Digest {
    /// The zero-filled sentinel: "no parent / no value".
    pub const ZERO: Digest = Digest([0u8; DIGEST_LENGTH]);

    /// Returns `true` if this is the sentinel digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; DIGEST_LENGTH]
    }

    /// Raw bytes accessor.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LENGTH] {
        &self.0
    }

    /// Hex encoding, for logs and external callers.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a digest from a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Digest> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; DIGEST_LENGTH] = bytes.try_into().ok()?;
        Some(Digest(arr))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Full hex is unreadable in test output; eight leading chars is
        // enough to tell digests apart at a glance.
        write!(f, "Digest({}…)", &self.to_hex()[..8])
    }
}

// ---------------------------------------------------------------------------
// Hash functions
// ---------------------------------------------------------------------------

/// Hashes a byte slice with BLAKE3.
pub fn hash(data: &[u8]) -> Digest {
    Digest(*blake3::hash(data).as_bytes())
}

/// Hashes multiple byte slices without concatenation overhead.
///
/// Feeds the parts sequentially into one hasher — identical output to
/// hashing the concatenation, minus the temporary buffer. This is the
/// workhorse for composite identities like `(parent || refs || timestamp)`.
pub fn hash_parts(parts: &[&[u8]]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    Digest(*hasher.finalize().as_bytes())
}

/// Domain-separated hash using BLAKE3's `derive_key` mode.
///
/// Same data under different context strings can never collide — the
/// context selects a distinct internal IV. Used wherever two protocol
/// surfaces hash structurally similar bytes (VRF outputs vs. node ids,
/// for instance) and must not be confusable.
pub fn hash_with_domain(context: &str, data: &[u8]) -> Digest {
    let mut hasher = blake3::Hasher::new_derive_key(context);
    hasher.update(data);
    Digest(*hasher.finalize().as_bytes())
}

/// Digest of a batch: the hash of the concatenated member digests, in order.
///
/// This is what the consensus engine certifies. Order-sensitive by design —
/// everyone must agree on batch ordering, not just batch membership.
pub fn batch_digest(members: &[Digest]) -> Digest {
    let mut hasher = blake3::Hasher::new();
    for d in members {
        hasher.update(d.as_bytes());
    }
    Digest(*hasher.finalize().as_bytes())
}

/// `SHA-256(SHA-256(data))` — the Bitcoin transaction-id construction.
///
/// Only the foreign-chain codec should be calling this. Trellis-native
/// identifiers use BLAKE3, which does not need the double-hash crutch.
pub fn double_sha256(data: &[u8]) -> Digest {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; DIGEST_LENGTH];
    out.copy_from_slice(&second);
    Digest(out)
}
