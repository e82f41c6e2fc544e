//! # Sharded Account Ledger
//!
//! Account state lives in independently-locked partitions, selected by a
//! deterministic function of the address. Same-shard transfers settle
//! atomically under one partition lock; cross-shard transfers run a
//! two-phase debit-then-credit protocol that never holds two locks at once.
//!
//! ```text
//! partition.rs — one shard's balances, tx ring, state digest
//! router.rs    — assignment, settlement, cross-shard 2PC, intent queue
//! ```

pub mod partition;
pub mod router;

pub use partition::{LedgerError, ShardPartition};
pub use router::{CrossShardIntent, SettlementError, SettlementReport, ShardRouter};
