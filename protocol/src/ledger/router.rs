//! The shard router: address assignment and settlement.
//!
//! Owns every [`ShardPartition`] behind its own mutex — shards are
//! independent lock domains, and operations on different shards never block
//! each other. A same-shard transfer settles atomically under one lock. A
//! cross-shard transfer runs the two-phase protocol:
//!
//! 1. **Prepare + debit** — under the source partition's lock, verify and
//!    deduct `amount + fee`. Insufficient funds end the settlement here,
//!    with nothing else touched. The lock is released.
//! 2. **Commit credit** — under the destination partition's lock, credit
//!    `amount`. A [`CrossShardIntent`] is enqueued for the external
//!    reconciler.
//!
//! At most one partition lock is ever held at a time. That rules out
//! cross-shard deadlock by construction, and it is also what creates the
//! in-transit window between the phases: funds debited at the source are
//! visible nowhere until the destination commits. There is no rollback or
//! recovery log for a crash between the phases — the intent queue plus the
//! per-shard state digests give the reconciler what it needs, and papering
//! over the window with speculative durability is out of scope on purpose.

use std::collections::VecDeque;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, trace};

use super::partition::{LedgerError, ShardPartition};
use crate::config::SHARD_COUNT;
use crate::crypto::Digest;
use crate::transaction::{Address, Transaction};

// ---------------------------------------------------------------------------
// CrossShardIntent
// ---------------------------------------------------------------------------

/// Audit record of a completed cross-shard settlement.
///
/// Enqueued after phase 2 commits, consumed FIFO by a single external
/// reconciler. The core itself never reads this queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossShardIntent {
    /// Shard the funds left.
    pub source_shard: u32,
    /// Shard the funds arrived at.
    pub dest_shard: u32,
    /// The settled transaction.
    pub tx_id: Digest,
}

// ---------------------------------------------------------------------------
// SettlementError
// ---------------------------------------------------------------------------

/// A rejected settlement, carrying everything the caller needs to decide
/// retry-vs-drop without re-deriving state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
    /// The sender's balance cannot cover `amount + fee`. No mutation.
    #[error(
        "transaction {tx_id}: insufficient funds on shard {shard} \
         (address {address} has {available}, needs {required})"
    )]
    InsufficientFunds {
        /// The rejected transaction.
        tx_id: Digest,
        /// Shard holding the sender's balance.
        shard: u32,
        /// The sender.
        address: Address,
        /// Balance at check time.
        available: u64,
        /// `amount + fee`.
        required: u64,
    },

    /// Balance arithmetic would overflow u64.
    #[error("transaction {tx_id}: balance overflow on shard {shard} for {address}")]
    BalanceOverflow {
        /// The rejected transaction.
        tx_id: Digest,
        /// The affected shard.
        shard: u32,
        /// The affected account.
        address: Address,
    },
}

impl SettlementError {
    fn from_ledger(err: LedgerError, tx_id: Digest) -> Self {
        match err {
            LedgerError::InsufficientFunds {
                shard,
                address,
                available,
                required,
            } => Self::InsufficientFunds {
                tx_id,
                shard,
                address,
                available,
                required,
            },
            LedgerError::BalanceOverflow { shard, address } => Self::BalanceOverflow {
                tx_id,
                shard,
                address,
            },
            // Corruption is not a per-transaction outcome; the audit path
            // surfaces it. A settlement call never produces it.
            LedgerError::StateCorruption { shard } => {
                unreachable!("settlement cannot observe corruption on shard {shard}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SettlementReport
// ---------------------------------------------------------------------------

/// Owned per-batch counters returned by [`ShardRouter::settle_batch`].
///
/// The orchestrator aggregates these; there is no ambient global counter
/// anywhere in the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementReport {
    /// Transactions settled successfully.
    pub settled: u64,
    /// Transactions rejected (all rejection reasons).
    pub rejected: u64,
    /// Of the settled, how many crossed shards.
    pub cross_shard: u64,
}

impl SettlementReport {
    /// Folds another report into this one.
    pub fn merge(&mut self, other: &SettlementReport) {
        self.settled += other.settled;
        self.rejected += other.rejected;
        self.cross_shard += other.cross_shard;
    }
}

// ---------------------------------------------------------------------------
// ShardRouter
// ---------------------------------------------------------------------------

/// Routes transactions to partitions and drives settlement.
pub struct ShardRouter {
    partitions: Vec<Mutex<ShardPartition>>,
    intents: Mutex<VecDeque<CrossShardIntent>>,
}

impl ShardRouter {
    /// Creates a router with the deployment's configured shard count.
    pub fn new() -> Self {
        Self::with_shard_count(SHARD_COUNT)
    }

    /// Creates a router with an explicit shard count.
    ///
    /// The count is fixed for the lifetime of the deployment — `assign` is
    /// a pure function of (address, count) and live resharding does not
    /// exist. Small counts are useful in tests to force address collisions
    /// onto chosen shards.
    pub fn with_shard_count(count: u32) -> Self {
        assert!(count > 0, "shard count must be positive");
        Self {
            partitions: (0..count).map(|i| Mutex::new(ShardPartition::new(i))).collect(),
            intents: Mutex::new(VecDeque::new()),
        }
    }

    /// Number of partitions.
    pub fn shard_count(&self) -> u32 {
        self.partitions.len() as u32
    }

    /// Deterministic consistent-hash assignment: a polynomial rolling hash
    /// over the address bytes, modulo the shard count.
    ///
    /// Pure and stable — the same address maps to the same shard for the
    /// lifetime of a deployment.
    pub fn assign(&self, address: &Address) -> u32 {
        let count = self.partitions.len() as u32;
        address
            .as_bytes()
            .iter()
            .fold(0u32, |h, b| (h.wrapping_mul(31).wrapping_add(u32::from(*b))) % count)
    }

    /// Settles one transaction: same-shard atomically under one lock, or
    /// cross-shard via the two-phase protocol described at module level.
    pub fn settle(&self, tx: &Transaction) -> Result<(), SettlementError> {
        let source = self.assign(&tx.from);
        let dest = self.assign(&tx.to);

        let required = tx
            .amount
            .checked_add(tx.fee)
            .ok_or(SettlementError::BalanceOverflow {
                tx_id: tx.id,
                shard: source,
                address: tx.from,
            })?;

        if source == dest {
            let mut partition = self.partitions[source as usize].lock();
            partition
                .debit_credit(&tx.from, &tx.to, tx.amount, tx.fee, tx.id)
                .map_err(|e| SettlementError::from_ledger(e, tx.id))?;
            trace!(tx = %tx.id, shard = source, "same-shard settlement");
            return Ok(());
        }

        // Phase 1: prepare + debit under the source lock only.
        {
            let mut partition = self.partitions[source as usize].lock();
            partition
                .debit_prepare(&tx.from, required, tx.id)
                .map_err(|e| SettlementError::from_ledger(e, tx.id))?;
        }

        // Between here and phase 2 the funds are in transit: debited at the
        // source, not yet credited at the destination.

        // Phase 2: commit the credit under the destination lock only.
        {
            let mut partition = self.partitions[dest as usize].lock();
            partition
                .credit_only(&tx.to, tx.amount, tx.id)
                .map_err(|e| SettlementError::from_ledger(e, tx.id))?;
        }

        self.intents.lock().push_back(CrossShardIntent {
            source_shard: source,
            dest_shard: dest,
            tx_id: tx.id,
        });

        debug!(tx = %tx.id, source, dest, "cross-shard settlement committed");
        Ok(())
    }

    /// Settles a batch, returning the per-transaction outcomes in input
    /// order alongside the owned counters for this stage.
    pub fn settle_batch(
        &self,
        txs: &[Transaction],
    ) -> (Vec<(Digest, Result<(), SettlementError>)>, SettlementReport) {
        let mut report = SettlementReport::default();
        let mut results = Vec::with_capacity(txs.len());

        for tx in txs {
            let crossing = self.assign(&tx.from) != self.assign(&tx.to);
            let outcome = self.settle(tx);
            match &outcome {
                Ok(()) => {
                    report.settled += 1;
                    if crossing {
                        report.cross_shard += 1;
                    }
                }
                Err(_) => report.rejected += 1,
            }
            results.push((tx.id, outcome));
        }

        (results, report)
    }

    /// Balance of an address, routed through `assign`.
    pub fn balance_of(&self, address: &Address) -> u64 {
        let shard = self.assign(address);
        self.partitions[shard as usize].lock().balance_of(address)
    }

    /// Balance of an address in an explicitly chosen shard. Callers that
    /// ask the wrong shard get zero, which is exactly what that shard
    /// believes.
    pub fn balance_in_shard(&self, address: &Address, shard: u32) -> u64 {
        match self.partitions.get(shard as usize) {
            Some(p) => p.lock().balance_of(address),
            None => 0,
        }
    }

    /// State digest of one shard, for the external reconciler.
    pub fn state_digest(&self, shard: u32) -> Option<Digest> {
        self.partitions
            .get(shard as usize)
            .map(|p| p.lock().state_digest())
    }

    /// Seeds a genesis balance into the owning shard.
    pub fn credit_genesis(&self, address: &Address, amount: u64) -> Result<(), LedgerError> {
        let shard = self.assign(address);
        self.partitions[shard as usize]
            .lock()
            .credit_genesis(address, amount)
    }

    /// Pops the oldest pending intent. FIFO, single consumer assumed.
    pub fn pop_intent(&self) -> Option<CrossShardIntent> {
        self.intents.lock().pop_front()
    }

    /// Number of intents awaiting the reconciler.
    pub fn intent_backlog(&self) -> usize {
        self.intents.lock().len()
    }

    /// Sum of all balances across every partition. Locks partitions one at
    /// a time, so the sum is only exact when settlement is quiescent — which
    /// is precisely when the conservation checks run it.
    pub fn total_balance(&self) -> u128 {
        self.partitions.iter().map(|p| p.lock().total_balance()).sum()
    }

    /// Audits every partition's state digest. The first corrupt shard is
    /// returned; the caller is expected to halt settlement rather than
    /// continue against a partition that failed its own arithmetic.
    pub fn audit_all(&self) -> Result<(), LedgerError> {
        for partition in &self.partitions {
            partition.lock().audit()?;
        }
        Ok(())
    }
}

impl Default for ShardRouter {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
