//! # Transaction Module
//!
//! Construction, signing, and verification of Trellis transactions.
//!
//! ```text
//! types.rs        — Address, ChainTag value types
//! builder.rs      — Transaction + fluent TransactionBuilder
//! signing.rs      — Ed25519 signing with embedded public key
//! verification.rs — structural and cryptographic checks
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** — assemble fields with [`TransactionBuilder`]; the id is
//!    computed from the signable bytes at build time.
//! 2. **Sign** — [`sign_transaction`] signs the id and embeds the sender's
//!    public key.
//! 3. **Submit** — the runtime runs [`verify_transaction`] before mempool
//!    admission; failures map to the `SignatureInvalid` rejection class and
//!    are never retried automatically.
//! 4. **Settle** — the shard router consumes the transaction exactly once.

pub mod builder;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{Transaction, TransactionBuilder};
pub use signing::{sign_transaction, SigningError};
pub use types::{Address, ChainTag};
pub use verification::{verify_transaction, TransactionError};
