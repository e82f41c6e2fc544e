//! The node runtime: mempool admission, pipeline workers, DAG append.
//!
//! [`NodeRuntime`] wires the core components together and drives them on a
//! cadence: a settlement worker drains the mempool in batches through the
//! shard router, and a consensus worker independently certifies (possibly
//! overlapping) batches through the engine, appending a ledger-graph node
//! for every certified batch. A third task periodically audits partition
//! state digests.
//!
//! ## Shutdown
//!
//! All workers observe a `tokio::sync::watch` flag and exit at their next
//! iteration boundary — never mid-critical-section. Nothing in the runtime
//! blocks on network I/O and nothing carries its own timeout; the only
//! blocking anywhere is short-duration lock acquisition.
//!
//! ## Fatal conditions
//!
//! Settlement rejections, failed quorums, and graph rejections are normal
//! outcomes, logged and counted. The one fatal condition is a partition
//! state-digest mismatch: the auditor halts the whole runtime rather than
//! keep settling against a balance map that failed its own arithmetic.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{
    CONSENSUS_BATCH_SIZE, CONSENSUS_INTERVAL, HEALTH_POLL_INTERVAL, SETTLEMENT_BATCH_SIZE,
    SETTLEMENT_IDLE_INTERVAL, VALIDATOR_MINIMUM,
};
use crate::consensus::{ConsensusEngine, VotePolicy};
use crate::crypto::{batch_digest, Digest, TrellisKeypair};
use crate::graph::{LedgerGraph, LedgerNode};
use crate::ledger::{SettlementError, SettlementReport, ShardRouter};
use crate::runtime::mempool::{Mempool, MempoolError};
use crate::runtime::metrics::RuntimeMetrics;
use crate::transaction::{verify_transaction, Address, Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Worker cadence and batch bounds. Defaults come from `config`; tests
/// shrink the intervals to keep themselves fast.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Transactions drained per settlement batch.
    pub settlement_batch_size: usize,
    /// Transactions certified per consensus batch.
    pub consensus_batch_size: usize,
    /// Validators sampled per certification round.
    pub validator_sample: u32,
    /// Settlement worker sleep when the mempool is empty.
    pub settlement_idle: std::time::Duration,
    /// Consensus worker cadence.
    pub consensus_interval: std::time::Duration,
    /// Partition audit cadence.
    pub audit_interval: std::time::Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            settlement_batch_size: SETTLEMENT_BATCH_SIZE,
            consensus_batch_size: CONSENSUS_BATCH_SIZE,
            validator_sample: VALIDATOR_MINIMUM,
            settlement_idle: SETTLEMENT_IDLE_INTERVAL,
            consensus_interval: CONSENSUS_INTERVAL,
            audit_interval: HEALTH_POLL_INTERVAL,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a submission is refused before reaching the mempool.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Signature or structural verification failed. Never retried
    /// automatically — resubmission is the sender's decision.
    #[error("transaction rejected: {0}")]
    SignatureInvalid(#[from] TransactionError),

    /// The mempool already holds this transaction.
    #[error("transaction {0} already pending")]
    DuplicateTransaction(Digest),

    /// The mempool is at capacity; retry after the backlog drains.
    #[error("mempool full (capacity {capacity})")]
    MempoolFull {
        /// The capacity that was hit.
        capacity: usize,
    },
}

impl From<MempoolError> for SubmitError {
    fn from(e: MempoolError) -> Self {
        match e {
            MempoolError::DuplicateTransaction(id) => Self::DuplicateTransaction(id),
            MempoolError::MempoolFull { capacity } => Self::MempoolFull { capacity },
        }
    }
}

// ---------------------------------------------------------------------------
// NodeRuntime
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Cumulative {
    settlement: SettlementReport,
    batches_settled: u64,
    rounds_run: u64,
    batches_certified: u64,
}

/// The assembled node: router, graph, mempool, consensus engine, and the
/// worker loops that connect them.
pub struct NodeRuntime {
    router: Arc<ShardRouter>,
    graph: Arc<LedgerGraph>,
    mempool: Arc<Mempool>,
    engine: RwLock<ConsensusEngine>,
    vote_policy: Box<dyn VotePolicy + Send + Sync>,
    keypair: TrellisKeypair,
    config: RuntimeConfig,
    shutdown: watch::Sender<bool>,
    cumulative: Mutex<Cumulative>,
    /// Digest of the most recently appended graph node; parent of the next.
    last_appended: Mutex<Digest>,
    /// Monotonic nanosecond source for graph-node timestamps. Owned by the
    /// runtime — not a process-wide singleton.
    clock_ns: AtomicU64,
    observed_tps: AtomicU64,
}

impl NodeRuntime {
    /// Assembles a runtime from its parts.
    ///
    /// `vote_policy` supplies validator votes during certification; the
    /// runtime never assumes how votes are produced.
    pub fn new(
        router: Arc<ShardRouter>,
        graph: Arc<LedgerGraph>,
        mempool: Arc<Mempool>,
        engine: ConsensusEngine,
        vote_policy: Box<dyn VotePolicy + Send + Sync>,
        keypair: TrellisKeypair,
        config: RuntimeConfig,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            router,
            graph,
            mempool,
            engine: RwLock::new(engine),
            vote_policy,
            keypair,
            config,
            shutdown,
            cumulative: Mutex::new(Cumulative::default()),
            last_appended: Mutex::new(Digest::ZERO),
            clock_ns: AtomicU64::new(0),
            observed_tps: AtomicU64::new(0),
        }
    }

    /// The shard router (shared with the external reconciler).
    pub fn router(&self) -> &Arc<ShardRouter> {
        &self.router
    }

    /// The ledger graph.
    pub fn graph(&self) -> &Arc<LedgerGraph> {
        &self.graph
    }

    /// The mempool.
    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    /// Verifies a transaction and admits it to the mempool.
    ///
    /// Returns the transaction id on success. Verification happens before
    /// admission, so the pool only ever holds transactions with valid
    /// signatures over valid ids.
    pub fn submit(&self, tx: Transaction) -> Result<Digest, SubmitError> {
        verify_transaction(&tx)?;
        let id = tx.id;
        self.mempool.push(tx)?;
        debug!(tx = %id, "transaction admitted to mempool");
        Ok(id)
    }

    /// Settles a batch through the router, folding the stage report into
    /// the cumulative totals. Returns the per-transaction outcomes.
    pub fn settle_batch(
        &self,
        txs: &[Transaction],
    ) -> Vec<(Digest, Result<(), SettlementError>)> {
        let started = Instant::now();
        let (results, report) = self.router.settle_batch(txs);

        let elapsed = started.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.observed_tps
                .store((report.settled as f64 / elapsed) as u64, Ordering::Relaxed);
        }

        let mut cumulative = self.cumulative.lock();
        cumulative.settlement.merge(&report);
        cumulative.batches_settled += 1;
        results
    }

    /// Runs one certification round over `batch`. Returns `true` if the
    /// batch reached quorum; a `false` is an expected outcome, and the
    /// caller may resubmit the batch in a later round.
    pub fn certify(&self, batch: &[Transaction]) -> bool {
        let certified = {
            let mut engine = self.engine.write();
            engine.adjust_mode(self.observed_tps.load(Ordering::Relaxed));
            let validators = engine.select_validators(self.config.validator_sample);
            engine.reach_consensus(batch, &validators, self.vote_policy.as_ref())
        };

        let mut cumulative = self.cumulative.lock();
        cumulative.rounds_run += 1;
        if certified {
            cumulative.batches_certified += 1;
        }
        certified
    }

    /// Balance of an address, routed to its owning shard.
    pub fn balance_of(&self, address: &Address) -> u64 {
        self.router.balance_of(address)
    }

    /// Appends a certified batch to the ledger graph: a node whose parent
    /// is the previously appended node, whose payload is the batch digest,
    /// signed by this node's keypair.
    pub fn append_certified_batch(&self, batch: &[Transaction]) -> Option<Digest> {
        if batch.is_empty() {
            return None;
        }
        let digest = batch_digest(&batch.iter().map(|tx| tx.id).collect::<Vec<_>>());
        let shard = self.router.assign(&batch[0].from);

        // Holding `last_appended` across the insert serializes appends, so
        // the certified chain stays linear even if callers race.
        let mut last = self.last_appended.lock();
        let node = LedgerNode::new(
            *last,
            Vec::new(),
            self.next_timestamp_ns(),
            shard,
            digest.as_bytes().to_vec(),
        )
        .certify(&self.keypair);
        let node_id = node.id;

        match self.graph.insert(node) {
            Ok(()) => {
                *last = node_id;
                info!(node = %node_id, batch = %digest, txs = batch.len(), "certified batch appended");
                Some(node_id)
            }
            Err(e) => {
                // Duplicate means this exact batch was already appended under
                // this parent — benign under at-least-once certification.
                warn!(error = %e, "certified batch not appended");
                None
            }
        }
    }

    /// Strictly monotonic nanosecond timestamps, even when the wall clock
    /// stalls or steps backwards.
    fn next_timestamp_ns(&self) -> u64 {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(0) as u64;
        let mut last = self.clock_ns.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match self.clock_ns.compare_exchange_weak(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }

    /// A point-in-time snapshot of the runtime's counters.
    pub fn metrics(&self) -> RuntimeMetrics {
        let cumulative = self.cumulative.lock();
        let engine = self.engine.read();
        RuntimeMetrics {
            settled: cumulative.settlement.settled,
            rejected: cumulative.settlement.rejected,
            cross_shard: cumulative.settlement.cross_shard,
            batches_settled: cumulative.batches_settled,
            rounds_run: cumulative.rounds_run,
            batches_certified: cumulative.batches_certified,
            mempool_depth: self.mempool.len(),
            graph_nodes: self.graph.len(),
            intent_backlog: self.router.intent_backlog(),
            mode: engine.mode(),
            round: engine.round(),
            observed_tps: self.observed_tps.load(Ordering::Relaxed),
        }
    }

    /// `true` until [`stop`](Self::stop) is called.
    pub fn is_running(&self) -> bool {
        !*self.shutdown.borrow()
    }

    /// Signals every worker to exit at its next iteration boundary.
    pub fn stop(&self) {
        info!("runtime shutdown requested");
        let _ = self.shutdown.send(true);
    }

    /// Spawns the settlement, consensus, and audit workers. Returns their
    /// handles; the workers run until [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        info!("runtime workers starting");
        vec![
            tokio::spawn(Self::settlement_worker(Arc::clone(self))),
            tokio::spawn(Self::consensus_worker(Arc::clone(self))),
            tokio::spawn(Self::audit_worker(Arc::clone(self))),
        ]
    }

    /// Drains the mempool in batches and settles them.
    async fn settlement_worker(runtime: Arc<Self>) {
        let mut shutdown = runtime.shutdown.subscribe();
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let batch = runtime.mempool.drain(runtime.config.settlement_batch_size);
            if batch.is_empty() {
                tokio::time::sleep(runtime.config.settlement_idle).await;
                continue;
            }

            let results = runtime.settle_batch(&batch);
            for (tx_id, outcome) in &results {
                if let Err(e) = outcome {
                    debug!(tx = %tx_id, error = %e, "settlement rejected");
                }
            }
        }
        info!("settlement worker stopped");
    }

    /// Certifies mempool batches and appends the certified ones to the DAG.
    async fn consensus_worker(runtime: Arc<Self>) {
        let mut shutdown = runtime.shutdown.subscribe();
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            let batch = runtime.mempool.peek(runtime.config.consensus_batch_size);
            if !batch.is_empty() && runtime.certify(&batch) {
                runtime.append_certified_batch(&batch);
            }

            tokio::time::sleep(runtime.config.consensus_interval).await;
        }
        info!("consensus worker stopped");
    }

    /// Periodically re-derives every partition's state digest. A mismatch
    /// is corruption, and the only safe response is to stop settling.
    async fn audit_worker(runtime: Arc<Self>) {
        let mut shutdown = runtime.shutdown.subscribe();
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            if let Err(e) = runtime.router.audit_all() {
                error!(error = %e, "partition audit failed — halting runtime");
                runtime.stop();
                break;
            }

            tokio::time::sleep(runtime.config.audit_interval).await;
        }
        info!("audit worker stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TrellisPublicKey;
    use crate::runtime::mempool::MempoolConfig;
    use crate::transaction::{sign_transaction, TransactionBuilder};
    use std::time::Duration;

    /// Every validator approves — the single-node deployment policy.
    fn approve_all() -> Box<dyn VotePolicy + Send + Sync> {
        Box::new(|_: &TrellisPublicKey, _: &Digest| true)
    }

    fn validator_pool(n: usize) -> Vec<TrellisPublicKey> {
        (0..n)
            .map(|i| TrellisKeypair::from_seed(&[i as u8 + 100; 32]).public_key())
            .collect()
    }

    fn test_runtime(policy: Box<dyn VotePolicy + Send + Sync>) -> Arc<NodeRuntime> {
        let router = Arc::new(ShardRouter::with_shard_count(8));
        let graph = Arc::new(LedgerGraph::new());
        let mempool = Arc::new(Mempool::new(MempoolConfig { capacity: 1_000 }));
        let engine = ConsensusEngine::new(validator_pool(4), [7u8; 32]);
        let config = RuntimeConfig {
            settlement_idle: Duration::from_millis(1),
            consensus_interval: Duration::from_millis(1),
            audit_interval: Duration::from_millis(5),
            validator_sample: 4,
            ..RuntimeConfig::default()
        };
        Arc::new(NodeRuntime::new(
            router,
            graph,
            mempool,
            engine,
            policy,
            TrellisKeypair::from_seed(&[200u8; 32]),
            config,
        ))
    }

    fn funded_signed_tx(runtime: &NodeRuntime, seed: u8, nonce: u64, amount: u64) -> Transaction {
        let kp = TrellisKeypair::from_seed(&[seed; 32]);
        let from = Address::from_public_key(&kp.public_key());
        runtime.router().credit_genesis(&from, 1_000_000).unwrap();

        let mut tx = TransactionBuilder::new()
            .from(from)
            .to(Address::from_bytes([0xDD; 20]))
            .amount(amount)
            .fee(5)
            .nonce(nonce)
            .timestamp(1_770_000_000_000 + nonce)
            .build();
        sign_transaction(&mut tx, &kp).unwrap();
        tx
    }

    #[test]
    fn submit_verifies_before_admission() {
        let runtime = test_runtime(approve_all());
        let tx = funded_signed_tx(&runtime, 1, 1, 100);
        let id = runtime.submit(tx).expect("valid transaction admitted");
        assert!(runtime.mempool().contains(&id));

        // Unsigned transaction never reaches the pool.
        let unsigned = TransactionBuilder::new()
            .from(Address::from_bytes([1; 20]))
            .to(Address::from_bytes([2; 20]))
            .amount(1)
            .nonce(1)
            .timestamp(1_770_000_000_000)
            .build();
        let result = runtime.submit(unsigned);
        assert!(matches!(result, Err(SubmitError::SignatureInvalid(_))));
        assert_eq!(runtime.mempool().len(), 1);
    }

    #[test]
    fn duplicate_submission_rejected() {
        let runtime = test_runtime(approve_all());
        let tx = funded_signed_tx(&runtime, 2, 1, 100);
        runtime.submit(tx.clone()).unwrap();
        assert!(matches!(
            runtime.submit(tx),
            Err(SubmitError::DuplicateTransaction(_))
        ));
    }

    #[test]
    fn settle_batch_updates_metrics() {
        let runtime = test_runtime(approve_all());
        let txs = vec![
            funded_signed_tx(&runtime, 3, 1, 100),
            funded_signed_tx(&runtime, 4, 1, 200),
        ];
        let results = runtime.settle_batch(&txs);
        assert!(results.iter().all(|(_, r)| r.is_ok()));

        let m = runtime.metrics();
        assert_eq!(m.settled, 2);
        assert_eq!(m.rejected, 0);
        assert_eq!(m.batches_settled, 1);
    }

    #[test]
    fn certify_consumes_a_round_even_on_failure() {
        let reject_all: Box<dyn VotePolicy + Send + Sync> =
            Box::new(|_: &TrellisPublicKey, _: &Digest| false);
        let runtime = test_runtime(reject_all);
        let tx = funded_signed_tx(&runtime, 5, 1, 100);

        assert!(!runtime.certify(std::slice::from_ref(&tx)));
        let m = runtime.metrics();
        assert_eq!(m.rounds_run, 1);
        assert_eq!(m.batches_certified, 0);
        assert_eq!(m.round, 1);
    }

    #[test]
    fn certified_batches_chain_in_the_graph() {
        let runtime = test_runtime(approve_all());
        let batch_a = vec![funded_signed_tx(&runtime, 6, 1, 100)];
        let batch_b = vec![funded_signed_tx(&runtime, 7, 1, 100)];

        assert!(runtime.certify(&batch_a));
        let first = runtime.append_certified_batch(&batch_a).expect("appended");

        assert!(runtime.certify(&batch_b));
        let second = runtime.append_certified_batch(&batch_b).expect("appended");

        let first_node = runtime.graph().get(&first).expect("resident");
        let second_node = runtime.graph().get(&second).expect("resident");
        assert!(first_node.parent.is_zero(), "first append roots the chain");
        assert_eq!(second_node.parent, first, "appends chain causally");
        assert!(second_node.timestamp_ns > first_node.timestamp_ns);
        assert!(second_node.certifier_signature.is_some());
        assert_eq!(runtime.graph().topological_order(), vec![first, second]);
    }

    #[test]
    fn append_of_empty_batch_is_a_noop() {
        let runtime = test_runtime(approve_all());
        assert_eq!(runtime.append_certified_batch(&[]), None);
        assert!(runtime.graph().is_empty());
    }

    #[test]
    fn monotonic_timestamps_under_contention() {
        use std::thread;
        let runtime = test_runtime(approve_all());

        let mut handles = Vec::new();
        for _ in 0..4 {
            let rt = Arc::clone(&runtime);
            handles.push(thread::spawn(move || {
                (0..1_000).map(|_| rt.next_timestamp_ns()).collect::<Vec<u64>>()
            }));
        }
        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("no panics"))
            .collect();

        let len_before = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), len_before, "timestamps are strictly unique");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn workers_settle_and_certify_end_to_end() {
        let runtime = test_runtime(approve_all());
        let handles = runtime.start();

        for nonce in 1..=20u64 {
            let tx = funded_signed_tx(&runtime, 10, nonce, 50);
            runtime.submit(tx).expect("admitted");
        }

        // Wait for the pipeline to drain.
        for _ in 0..200 {
            if runtime.mempool().is_empty() && runtime.metrics().settled >= 20 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        runtime.stop();
        for handle in handles {
            handle.await.expect("worker exits cleanly");
        }

        let m = runtime.metrics();
        assert_eq!(m.settled, 20);
        assert_eq!(m.mempool_depth, 0);
        assert!(m.rounds_run > 0);
        assert!(!runtime.is_running());
    }

    #[tokio::test]
    async fn stop_terminates_idle_workers() {
        let runtime = test_runtime(approve_all());
        let handles = runtime.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        runtime.stop();
        for handle in handles {
            handle.await.expect("workers observe the flag");
        }
    }
}
