//! Transaction verification: structural checks and signature validation.
//!
//! Every transaction must pass [`verify_transaction`] before it is admitted
//! to the mempool. Checks run cheapest-first so clearly invalid submissions
//! waste minimal CPU. A rejected transaction is never retried automatically
//! — resubmission is the sender's decision.

use thiserror::Error;

use super::builder::Transaction;
use super::types::Address;
use crate::crypto::Digest;

/// Reasons a transaction fails verification.
///
/// Every variant carries enough context for the submitter to diagnose the
/// rejection without re-deriving state.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The stored id does not match the hash of the signable fields.
    #[error("transaction id mismatch: expected {expected}, got {actual}")]
    IdMismatch {
        /// Recomputed id.
        expected: Digest,
        /// Id the transaction claims.
        actual: Digest,
    },

    /// `amount + fee` overflows u64 — unsatisfiable by construction.
    #[error("amount {amount} + fee {fee} overflows")]
    DebitOverflow {
        /// Declared amount.
        amount: u64,
        /// Declared fee.
        fee: u64,
    },

    /// The transaction carries no signature.
    #[error("transaction {id} is unsigned")]
    MissingSignature {
        /// Id of the unsigned transaction.
        id: Digest,
    },

    /// The transaction carries no embedded public key.
    #[error("transaction {id} has no embedded public key")]
    MissingPublicKey {
        /// Id of the offending transaction.
        id: Digest,
    },

    /// The embedded public key does not own the claimed sender address.
    #[error("public key does not own sender address {from}")]
    AddressMismatch {
        /// The claimed sender.
        from: Address,
    },

    /// The signature does not verify over the transaction id.
    #[error("invalid signature on transaction {id}")]
    InvalidSignature {
        /// Id of the offending transaction.
        id: Digest,
    },
}

/// Verifies a signed transaction.
///
/// Checks, in order:
///
/// 1. **Debit arithmetic** — `amount + fee` must not overflow.
/// 2. **Id integrity** — stored id equals the hash of the signable fields.
/// 3. **Signature present**, **public key present**.
/// 4. **Address ownership** — the embedded key hashes to `from`. Without
///    this, any keypair could sign for any address (key substitution).
/// 5. **Signature validity** — Ed25519 verification over the id bytes.
///
/// Returns the first failing check.
pub fn verify_transaction(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.total_debit().is_none() {
        return Err(TransactionError::DebitOverflow {
            amount: tx.amount,
            fee: tx.fee,
        });
    }

    let expected = tx.compute_id();
    if tx.id != expected {
        return Err(TransactionError::IdMismatch {
            expected,
            actual: tx.id,
        });
    }

    let signature = tx
        .signature
        .as_ref()
        .ok_or(TransactionError::MissingSignature { id: tx.id })?;

    let public_key = tx
        .public_key
        .as_ref()
        .ok_or(TransactionError::MissingPublicKey { id: tx.id })?;

    if Address::from_public_key(public_key) != tx.from {
        return Err(TransactionError::AddressMismatch { from: tx.from });
    }

    if !public_key.verify(tx.id.as_bytes(), signature) {
        return Err(TransactionError::InvalidSignature { id: tx.id });
    }

    Ok(())
}
