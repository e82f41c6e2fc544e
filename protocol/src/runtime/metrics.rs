//! Owned pipeline metrics.
//!
//! There is no global counter anywhere in the core. Each pipeline stage
//! returns its own numbers (`SettlementReport` from the router, round
//! records from the consensus engine), and the orchestrator folds them into
//! the cumulative totals snapshotted here. Consumers — the node binary's
//! Prometheus exporter, tests, log lines — take a [`RuntimeMetrics`] value
//! and own it outright.

use crate::consensus::ConsensusMode;

/// A point-in-time view of the runtime's counters and gauges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuntimeMetrics {
    /// Transactions settled successfully since startup.
    pub settled: u64,
    /// Transactions rejected at settlement since startup.
    pub rejected: u64,
    /// Settled transactions that crossed shards.
    pub cross_shard: u64,
    /// Settlement batches processed.
    pub batches_settled: u64,
    /// Consensus rounds run (certified or not).
    pub rounds_run: u64,
    /// Batches that reached quorum.
    pub batches_certified: u64,
    /// Transactions currently queued in the mempool.
    pub mempool_depth: usize,
    /// Nodes resident in the ledger graph.
    pub graph_nodes: usize,
    /// Cross-shard intents awaiting the external reconciler.
    pub intent_backlog: usize,
    /// Current consensus operating mode.
    pub mode: ConsensusMode,
    /// Next consensus round number.
    pub round: u32,
    /// Most recent observed settlement throughput, transactions per second.
    pub observed_tps: u64,
}
