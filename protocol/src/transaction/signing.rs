//! Transaction signing.
//!
//! A signature covers the 32-byte transaction id (which already commits to
//! every signable field), and signing embeds the public key so that any
//! verifier can check address ownership without a key registry.

use super::builder::Transaction;
use crate::crypto::TrellisKeypair;
use crate::transaction::types::Address;
use thiserror::Error;

/// Errors from the signing step.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The keypair does not own the transaction's `from` address. Signing
    /// anyway would produce a transaction that every honest verifier
    /// rejects, so we refuse up front.
    #[error("keypair does not own sender address {from}")]
    NotSender {
        /// The claimed sender address.
        from: Address,
    },
}

/// Signs a transaction in place with the sender's keypair.
///
/// Refuses to sign if the keypair's derived address differs from
/// `tx.from` — a signature from the wrong key is worthless and catching
/// the mismatch here beats debugging a rejection three components later.
pub fn sign_transaction(tx: &mut Transaction, keypair: &TrellisKeypair) -> Result<(), SigningError> {
    let public_key = keypair.public_key();
    let derived = Address::from_public_key(&public_key);
    if derived != tx.from {
        return Err(SigningError::NotSender { from: tx.from });
    }

    tx.signature = Some(keypair.sign(tx.id.as_bytes()));
    tx.public_key = Some(public_key);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::TransactionBuilder;

    #[test]
    fn signing_embeds_key_and_signature() {
        let kp = TrellisKeypair::from_seed(&[11u8; 32]);
        let sender = Address::from_public_key(&kp.public_key());

        let mut tx = TransactionBuilder::new()
            .from(sender)
            .to(Address::from_bytes([2u8; 20]))
            .amount(500)
            .fee(10)
            .nonce(1)
            .timestamp(1_770_000_000_000)
            .build();

        sign_transaction(&mut tx, &kp).expect("owner can sign");
        assert!(tx.is_signed());
        assert_eq!(tx.public_key, Some(kp.public_key()));

        let sig = tx.signature.as_ref().unwrap();
        assert!(kp.public_key().verify(tx.id.as_bytes(), sig));
    }

    #[test]
    fn refuses_to_sign_for_foreign_address() {
        let owner = TrellisKeypair::from_seed(&[1u8; 32]);
        let stranger = TrellisKeypair::from_seed(&[2u8; 32]);

        let mut tx = TransactionBuilder::new()
            .from(Address::from_public_key(&owner.public_key()))
            .to(Address::from_bytes([2u8; 20]))
            .amount(500)
            .nonce(1)
            .timestamp(1_770_000_000_000)
            .build();

        let result = sign_transaction(&mut tx, &stranger);
        assert!(matches!(result, Err(SigningError::NotSender { .. })));
        assert!(!tx.is_signed());
    }

    #[test]
    fn signature_does_not_change_id() {
        let kp = TrellisKeypair::from_seed(&[7u8; 32]);
        let mut tx = TransactionBuilder::new()
            .from(Address::from_public_key(&kp.public_key()))
            .to(Address::from_bytes([9u8; 20]))
            .amount(1)
            .nonce(1)
            .timestamp(1_770_000_000_000)
            .build();

        let id_before = tx.id;
        sign_transaction(&mut tx, &kp).unwrap();
        assert_eq!(tx.id, id_before);
        assert_eq!(tx.id, tx.compute_id());
    }
}
