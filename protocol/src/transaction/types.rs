//! Core value types for Trellis transactions.
//!
//! Kept small and `Copy`-friendly — these types sit on the hot validation
//! and settlement paths, and a 20-byte address in a register beats a heap
//! string every time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ADDRESS_LENGTH;
use crate::crypto::{hash, TrellisPublicKey};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account address.
///
/// Derived from an Ed25519 public key by hashing and truncating — the
/// address commits to the key, so verification can check that a transaction's
/// embedded public key actually owns the claimed `from` address. Accounts
/// are created implicitly on first credit; an address with no history simply
/// reads as balance zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; ADDRESS_LENGTH]);

impl Address {
    /// Derives the address owned by a public key: the first 20 bytes of
    /// `blake3(public_key)`.
    pub fn from_public_key(pk: &TrellisPublicKey) -> Self {
        let digest = hash(pk.as_bytes());
        let mut out = [0u8; ADDRESS_LENGTH];
        out.copy_from_slice(&digest.as_bytes()[..ADDRESS_LENGTH]);
        Address(out)
    }

    /// Wraps raw address bytes.
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bytes)
    }

    /// Raw bytes accessor.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Hex encoding, for logs and error messages.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", &self.to_hex()[..8])
    }
}

// ---------------------------------------------------------------------------
// ChainTag
// ---------------------------------------------------------------------------

/// Origin tag for a transaction: native to this ledger, or translated from
/// a foreign chain by the bridge codec.
///
/// A closed variant set, on purpose. Supporting a new chain means adding a
/// variant and the corresponding codec arm — a compile-error-guided tour of
/// every place that must care — rather than registering an object behind a
/// vtable and hoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainTag {
    /// A Trellis-native transaction.
    Native,
    /// Translated from a Bitcoin transaction.
    Bitcoin,
    /// Translated from an Ethereum transaction.
    Ethereum,
    /// Translated from a Solana transaction.
    Solana,
}

impl ChainTag {
    /// Stable single-byte encoding used in transaction ids and wire formats.
    pub fn as_byte(&self) -> u8 {
        match self {
            Self::Native => 0,
            Self::Bitcoin => 1,
            Self::Ethereum => 2,
            Self::Solana => 3,
        }
    }

    /// Decodes the single-byte encoding. Unknown bytes are `None` — we
    /// don't guess at chains we've never heard of.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Native),
            1 => Some(Self::Bitcoin),
            2 => Some(Self::Ethereum),
            3 => Some(Self::Solana),
            _ => None,
        }
    }
}

impl fmt::Display for ChainTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Bitcoin => write!(f, "bitcoin"),
            Self::Ethereum => write!(f, "ethereum"),
            Self::Solana => write!(f, "solana"),
        }
    }
}
