//! The pending-transaction pool.
//!
//! A single FIFO queue behind one mutex — deliberately boring. What this
//! pool actually sells is its atomicity guarantee: a batch drain and a
//! concurrent submission never interleave, so an arriving transaction is
//! either wholly in the next batch or wholly outside the current one, never
//! split across the boundary. One lock over `{queue, id-set}` makes that
//! guarantee free.
//!
//! Admission control (signature verification) happens in the orchestrator
//! before anything reaches `push`; the pool itself only enforces capacity
//! and uniqueness.

use std::collections::{HashSet, VecDeque};

use parking_lot::Mutex;
use thiserror::Error;

use crate::config::MEMPOOL_CAPACITY;
use crate::crypto::Digest;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunable mempool parameters.
#[derive(Debug, Clone)]
pub struct MempoolConfig {
    /// Maximum number of queued transactions.
    pub capacity: usize,
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            capacity: MEMPOOL_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons the pool refuses a transaction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    /// A transaction with this id is already queued.
    #[error("transaction {0} already in mempool")]
    DuplicateTransaction(Digest),

    /// The pool is at capacity.
    #[error("mempool full ({capacity} transactions)")]
    MempoolFull {
        /// The configured capacity that was hit.
        capacity: usize,
    },
}

// ---------------------------------------------------------------------------
// Mempool
// ---------------------------------------------------------------------------

struct MempoolInner {
    queue: VecDeque<Transaction>,
    queued_ids: HashSet<Digest>,
}

/// Thread-safe FIFO transaction pool with atomic batch extraction.
pub struct Mempool {
    inner: Mutex<MempoolInner>,
    config: MempoolConfig,
}

impl Mempool {
    /// Creates a pool with the given configuration.
    pub fn new(config: MempoolConfig) -> Self {
        Self {
            inner: Mutex::new(MempoolInner {
                queue: VecDeque::new(),
                queued_ids: HashSet::new(),
            }),
            config,
        }
    }

    /// Enqueues a verified transaction.
    pub fn push(&self, tx: Transaction) -> Result<(), MempoolError> {
        let mut inner = self.inner.lock();

        if inner.queued_ids.contains(&tx.id) {
            return Err(MempoolError::DuplicateTransaction(tx.id));
        }
        if inner.queue.len() >= self.config.capacity {
            return Err(MempoolError::MempoolFull {
                capacity: self.config.capacity,
            });
        }

        inner.queued_ids.insert(tx.id);
        inner.queue.push_back(tx);
        Ok(())
    }

    /// Atomically extracts up to `max` transactions in FIFO order.
    ///
    /// Holds the pool lock for the whole extraction, which is the atomicity
    /// contract: submissions racing this call land entirely after it.
    pub fn drain(&self, max: usize) -> Vec<Transaction> {
        let mut inner = self.inner.lock();
        let take = max.min(inner.queue.len());
        let batch: Vec<Transaction> = inner.queue.drain(..take).collect();
        for tx in &batch {
            inner.queued_ids.remove(&tx.id);
        }
        batch
    }

    /// Reads up to `max` transactions without removing them — the consensus
    /// worker certifies batches it does not own.
    pub fn peek(&self, max: usize) -> Vec<Transaction> {
        let inner = self.inner.lock();
        inner.queue.iter().take(max).cloned().collect()
    }

    /// `true` if a transaction with this id is queued.
    pub fn contains(&self, tx_id: &Digest) -> bool {
        self.inner.lock().queued_ids.contains(tx_id)
    }

    /// Number of queued transactions.
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new(MempoolConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
