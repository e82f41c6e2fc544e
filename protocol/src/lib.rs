// Copyright (c) 2026 Meshwork Labs. MIT License.
// See LICENSE for details.

//! # Trellis Protocol — Core Library
//!
//! The transaction-ordering and state-partitioning core of a permissioned
//! ledger node. Trellis doesn't chain blocks; it grows a DAG of certified
//! batches over a sharded account-state machine, and it adapts how paranoid
//! its consensus is to how hard it's being pushed.
//!
//! ## Architecture
//!
//! The modules mirror the actual concerns of the node:
//!
//! - **crypto** — Hashing and signing, consumed everywhere else as an
//!   opaque oracle. Swap the algorithms here, re-genesis, done.
//! - **transaction** — Construction, signing, verification. Immutable value
//!   objects with ids that commit to every meaningful field.
//! - **graph** — The ledger DAG. Admission requires the full causal
//!   closure, which is what keeps it acyclic without ever checking.
//! - **ledger** — Sharded balances. Independent per-partition locks,
//!   atomic same-shard settlement, two-phase cross-shard settlement.
//! - **consensus** — Load-adaptive quorum certification with pluggable
//!   vote collection. The engine counts votes; it does not collect them.
//! - **runtime** — The orchestration layer: mempool, worker loops,
//!   auditing, health observation, owned metrics.
//! - **bridge** — Foreign-chain byte translation. A closed variant set,
//!   not an adapter zoo.
//! - **config** — Every constant, in one place.
//!
//! ## Ground rules
//!
//! 1. No mutation outside a lock; no two partition locks held at once.
//! 2. Rejections are values, not panics. The only fatal condition is a
//!    state digest that stops matching its balance map.
//! 3. If it touches balances, it has tests. Plural.

pub mod bridge;
pub mod config;
pub mod consensus;
pub mod crypto;
pub mod graph;
pub mod ledger;
pub mod runtime;
pub mod transaction;
