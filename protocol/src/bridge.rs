//! Foreign-chain transfer codec.
//!
//! Translates between foreign-chain transfer encodings and native
//! transactions, one closed match arm per [`ChainTag`]. Adding a chain
//! means adding a variant and the corresponding arms — the compiler then
//! walks you through every place that must learn about it, which is the
//! whole point of keeping the set closed instead of registering adapters
//! behind a vtable.
//!
//! Scope is strictly the byte translation. No RPC endpoints, no validator
//! sets, no cross-chain trust: whether a foreign transfer should be
//! believed is a question for an external collaborator with a view of the
//! foreign chain.
//!
//! ## Wire layouts
//!
//! The supported encodings are flat fixed-offset layouts:
//!
//! | chain    | from   | to      | amount (u64 LE) | min len |
//! |----------|--------|---------|-----------------|---------|
//! | bitcoin  | 0..20  | 20..40  | 40..48          | 48      |
//! | ethereum | 0..20  | 20..40  | 40..48          | 48      |
//! | solana   | 0..20  | 32..52  | 64..72          | 72      |

use thiserror::Error;

use crate::crypto::{double_sha256, hash, Digest};
use crate::transaction::{Address, ChainTag, Transaction, TransactionBuilder};

/// Reasons a foreign payload fails to translate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The tag has no foreign encoding (`Native` is not a foreign chain).
    #[error("chain {0} has no foreign encoding")]
    UnsupportedChain(ChainTag),

    /// The payload is shorter than the chain's fixed layout.
    #[error("truncated {chain} payload: need {expected} bytes, got {got}")]
    TruncatedPayload {
        /// Which chain's layout was expected.
        chain: ChainTag,
        /// Minimum length for that layout.
        expected: usize,
        /// Actual payload length.
        got: usize,
    },
}

/// A foreign transfer, decoded but not yet lifted into a native transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignTransfer {
    /// Originating chain.
    pub chain: ChainTag,
    /// Sender, as mapped into the native address space.
    pub from: Address,
    /// Receiver, as mapped into the native address space.
    pub to: Address,
    /// Transfer amount in the foreign chain's smallest unit.
    pub amount: u64,
    /// Local reference id for the raw foreign bytes.
    pub reference: Digest,
}

impl ForeignTransfer {
    /// Lifts the transfer into a native [`Transaction`], carrying the raw
    /// foreign bytes in `aux_payload` so the original encoding survives
    /// round trips. The result is unsigned — a bridge custodian signs it
    /// like any other submission.
    pub fn into_transaction(self, raw: Vec<u8>, nonce: u64, fee: u64) -> Transaction {
        TransactionBuilder::new()
            .chain_tag(self.chain)
            .from(self.from)
            .to(self.to)
            .amount(self.amount)
            .fee(fee)
            .nonce(nonce)
            .aux_payload(raw)
            .build()
    }
}

/// Byte ranges for each foreign layout: (from, to, amount, min_len).
type Layout = (usize, usize, usize, usize);

fn layout(chain: ChainTag) -> Result<Layout, BridgeError> {
    match chain {
        ChainTag::Bitcoin | ChainTag::Ethereum => Ok((0, 20, 40, 48)),
        ChainTag::Solana => Ok((0, 32, 64, 72)),
        ChainTag::Native => Err(BridgeError::UnsupportedChain(ChainTag::Native)),
    }
}

/// Local reference id for a raw foreign payload.
///
/// Bitcoin references use its own double-SHA-256 txid convention so they
/// can be compared against upstream explorers; other chains get a BLAKE3
/// reference that is local to this node. Neither claims to be the foreign
/// chain's canonical id.
pub fn reference_id(chain: ChainTag, raw: &[u8]) -> Digest {
    match chain {
        ChainTag::Bitcoin => double_sha256(raw),
        _ => hash(raw),
    }
}

/// Decodes a raw foreign payload into a [`ForeignTransfer`].
pub fn parse_foreign(chain: ChainTag, raw: &[u8]) -> Result<ForeignTransfer, BridgeError> {
    let (from_at, to_at, amount_at, min_len) = layout(chain)?;
    if raw.len() < min_len {
        return Err(BridgeError::TruncatedPayload {
            chain,
            expected: min_len,
            got: raw.len(),
        });
    }

    let mut from = [0u8; 20];
    from.copy_from_slice(&raw[from_at..from_at + 20]);
    let mut to = [0u8; 20];
    to.copy_from_slice(&raw[to_at..to_at + 20]);
    let amount = u64::from_le_bytes(raw[amount_at..amount_at + 8].try_into().expect("8 bytes"));

    Ok(ForeignTransfer {
        chain,
        from: Address::from_bytes(from),
        to: Address::from_bytes(to),
        amount,
        reference: reference_id(chain, raw),
    })
}

/// Encodes a native transaction into the foreign chain's layout.
pub fn encode_foreign(chain: ChainTag, tx: &Transaction) -> Result<Vec<u8>, BridgeError> {
    let (from_at, to_at, amount_at, min_len) = layout(chain)?;

    let mut raw = vec![0u8; min_len];
    raw[from_at..from_at + 20].copy_from_slice(tx.from.as_bytes());
    raw[to_at..to_at + 20].copy_from_slice(tx.to.as_bytes());
    raw[amount_at..amount_at + 8].copy_from_slice(&tx.amount.to_le_bytes());
    Ok(raw)
}
