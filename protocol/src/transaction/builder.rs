//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] enforces a disciplined construction flow: set
//! the fields, call `.build()`, and get back an unsigned [`Transaction`]
//! whose id is already computed from its contents. The builder does not
//! sign — that happens in [`super::signing`]. The separation keeps
//! construction testable without key material.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::{Address, ChainTag};
use crate::crypto::{hash, Digest, TrellisPublicKey, TrellisSignature};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A Trellis transaction — the unit of value movement on the ledger.
///
/// Immutable once built: ownership moves submitter → mempool → exactly one
/// settlement attempt, and no stage mutates the fields.
///
/// The `id` is `blake3(signable_bytes)`, where the signable bytes cover
/// every field *except* `public_key` and `signature`. The id is therefore
/// stable across signing: compute it before the transaction is signed and
/// it will not change afterward. The signature is made over the 32 id
/// bytes, and the embedded public key lets a verifier check ownership of
/// the `from` address without any external key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id: `blake3(signable_bytes)`.
    pub id: Digest,

    /// Origin chain of this transaction.
    pub chain_tag: ChainTag,

    /// Sender address. Must be owned by the embedded public key.
    pub from: Address,

    /// Receiver address.
    pub to: Address,

    /// Transfer amount in grains (the smallest unit).
    pub amount: u64,

    /// Fee in grains. Debited from the sender together with `amount` and
    /// burned — fees are not redistributed in this core.
    pub fee: u64,

    /// Per-sender sequence number.
    pub nonce: u64,

    /// Unix timestamp in milliseconds at creation.
    pub timestamp: u64,

    /// Chain-specific auxiliary bytes. Empty for plain native transfers;
    /// the bridge codec uses it to carry the foreign encoding.
    pub aux_payload: Vec<u8>,

    /// Sender's public key, embedded during signing so validators can
    /// verify without a key registry. `None` fresh from the builder.
    pub public_key: Option<TrellisPublicKey>,

    /// Ed25519 signature over the id bytes. `None` until signed.
    pub signature: Option<TrellisSignature>,
}

impl Transaction {
    /// Canonical byte representation used for id computation.
    ///
    /// A deterministic concatenation of fixed-width little-endian fields —
    /// serde is deliberately not involved, because wire formats must not
    /// depend on serializer field ordering. Excluded: `id`, `public_key`,
    /// `signature`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(80 + self.aux_payload.len());
        buf.push(self.chain_tag.as_byte());
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(self.to.as_bytes());
        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.fee.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(self.aux_payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.aux_payload);
        buf
    }

    /// Recomputes the id from the current field values.
    pub fn compute_id(&self) -> Digest {
        hash(&self.signable_bytes())
    }

    /// Returns `true` if the transaction carries a signature.
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Total grains leaving the sender if this transaction settles.
    /// `None` if `amount + fee` would overflow — such a transaction can
    /// never settle and callers should reject it outright.
    pub fn total_debit(&self) -> Option<u64> {
        self.amount.checked_add(self.fee)
    }

    /// Compact wire encoding for the (external) gossip collaborator.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("transaction serialization is infallible")
    }

    /// Decodes a transaction from its wire encoding.
    pub fn from_wire_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`]s.
///
/// ```
/// use trellis_protocol::transaction::{TransactionBuilder, types::Address};
///
/// let tx = TransactionBuilder::new()
///     .from(Address::from_bytes([1; 20]))
///     .to(Address::from_bytes([2; 20]))
///     .amount(50_000)
///     .fee(10)
///     .nonce(1)
///     .build();
/// assert_eq!(tx.id, tx.compute_id());
/// ```
///
/// Defaults: `chain_tag = Native`, `timestamp` = now (override for
/// deterministic tests), everything else zero/empty.
pub struct TransactionBuilder {
    chain_tag: ChainTag,
    from: Address,
    to: Address,
    amount: u64,
    fee: u64,
    nonce: u64,
    timestamp: Option<u64>,
    aux_payload: Vec<u8>,
}

impl TransactionBuilder {
    /// Starts a builder for a native transfer.
    pub fn new() -> Self {
        Self {
            chain_tag: ChainTag::Native,
            from: Address::from_bytes([0u8; 20]),
            to: Address::from_bytes([0u8; 20]),
            amount: 0,
            fee: 0,
            nonce: 0,
            timestamp: None,
            aux_payload: Vec::new(),
        }
    }

    /// Sets the origin chain tag.
    pub fn chain_tag(mut self, tag: ChainTag) -> Self {
        self.chain_tag = tag;
        self
    }

    /// Sets the sender address.
    pub fn from(mut self, from: Address) -> Self {
        self.from = from;
        self
    }

    /// Sets the receiver address.
    pub fn to(mut self, to: Address) -> Self {
        self.to = to;
        self
    }

    /// Sets the transfer amount in grains.
    pub fn amount(mut self, amount: u64) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the fee in grains.
    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Sets the sender's nonce.
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the timestamp explicitly (Unix milliseconds). If not called,
    /// `build()` stamps the current UTC time.
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Attaches chain-specific auxiliary bytes.
    pub fn aux_payload(mut self, data: Vec<u8>) -> Self {
        self.aux_payload = data;
        self
    }

    /// Consumes the builder and produces an unsigned [`Transaction`] with
    /// its id computed.
    pub fn build(self) -> Transaction {
        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis() as u64);

        let mut tx = Transaction {
            id: Digest::ZERO,
            chain_tag: self.chain_tag,
            from: self.from,
            to: self.to,
            amount: self.amount,
            fee: self.fee,
            nonce: self.nonce,
            timestamp,
            aux_payload: self.aux_payload,
            public_key: None,
            signature: None,
        };
        tx.id = tx.compute_id();
        tx
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
