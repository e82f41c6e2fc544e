//! End-to-end integration tests for the Trellis protocol core.
//!
//! These exercise the full pipeline the way the node binary drives it:
//! identity creation, transaction construction and signing, mempool
//! admission, sharded settlement (same-shard and cross-shard), consensus
//! certification, and the ledger-graph append of certified batches.
//!
//! Each test assembles its own components. No shared state, no ordering
//! dependencies, no flaky failures.

use std::sync::Arc;
use std::time::Duration;

use trellis_protocol::consensus::{quorum_threshold, ConsensusEngine, VotePolicy};
use trellis_protocol::crypto::{Digest, TrellisKeypair, TrellisPublicKey};
use trellis_protocol::graph::{LedgerGraph, LedgerNode};
use trellis_protocol::ledger::{SettlementError, ShardRouter};
use trellis_protocol::runtime::{
    Mempool, MempoolConfig, NodeRuntime, RuntimeConfig, SubmitError,
};
use trellis_protocol::transaction::{
    sign_transaction, verify_transaction, Address, Transaction, TransactionBuilder,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// An account with its keypair and derived address.
struct Account {
    keypair: TrellisKeypair,
    address: Address,
}

impl Account {
    fn new(seed: u8) -> Self {
        let keypair = TrellisKeypair::from_seed(&[seed; 32]);
        let address = Address::from_public_key(&keypair.public_key());
        Self { keypair, address }
    }

    fn transfer(&self, to: Address, amount: u64, fee: u64, nonce: u64) -> Transaction {
        let mut tx = TransactionBuilder::new()
            .from(self.address)
            .to(to)
            .amount(amount)
            .fee(fee)
            .nonce(nonce)
            .timestamp(1_770_000_000_000 + nonce)
            .build();
        sign_transaction(&mut tx, &self.keypair).expect("account owns its address");
        tx
    }
}

fn validator_pool(n: usize) -> Vec<TrellisPublicKey> {
    (0..n)
        .map(|i| TrellisKeypair::from_seed(&[i as u8 + 50; 32]).public_key())
        .collect()
}

fn approve_all() -> Box<dyn VotePolicy + Send + Sync> {
    Box::new(|_: &TrellisPublicKey, _: &Digest| true)
}

/// Assembles a runtime over a small shard count (collisions on purpose)
/// with fast worker cadences.
fn build_runtime(policy: Box<dyn VotePolicy + Send + Sync>) -> Arc<NodeRuntime> {
    let router = Arc::new(ShardRouter::with_shard_count(8));
    let graph = Arc::new(LedgerGraph::new());
    let mempool = Arc::new(Mempool::new(MempoolConfig { capacity: 10_000 }));
    let engine = ConsensusEngine::new(validator_pool(21), [99u8; 32]);
    let config = RuntimeConfig {
        settlement_idle: Duration::from_millis(1),
        consensus_interval: Duration::from_millis(2),
        audit_interval: Duration::from_millis(10),
        ..RuntimeConfig::default()
    };
    Arc::new(NodeRuntime::new(
        router,
        graph,
        mempool,
        engine,
        policy,
        TrellisKeypair::from_seed(&[255u8; 32]),
        config,
    ))
}

// ---------------------------------------------------------------------------
// 1. Sequential-spend scenario
// ---------------------------------------------------------------------------

#[test]
fn five_transfers_overdraw_on_the_fifth() {
    // A holds 10 000. Five transfers of [1000, 1500, 2000, 2500, 3000],
    // all with fee 10. Total debit would be 10 050 — the first four settle,
    // the fifth fails, and A is left with exactly
    // 10000 - 1000-10 - 1500-10 - 2000-10 - 2500-10 = 2960.
    let runtime = build_runtime(approve_all());
    let alice = Account::new(1);
    let bob = Account::new(2);
    runtime.router().credit_genesis(&alice.address, 10_000).unwrap();

    let amounts = [1_000u64, 1_500, 2_000, 2_500, 3_000];
    let mut batch = Vec::new();
    for (i, amount) in amounts.iter().enumerate() {
        let tx = alice.transfer(bob.address, *amount, 10, i as u64 + 1);
        runtime.submit(tx.clone()).expect("verified and admitted");
        batch.push(tx);
    }

    let drained = runtime.mempool().drain(100);
    assert_eq!(drained.len(), 5, "all five admitted");

    let results = runtime.settle_batch(&drained);
    for (_, outcome) in &results[..4] {
        assert!(outcome.is_ok(), "first four transfers settle");
    }
    assert!(matches!(
        results[4].1,
        Err(SettlementError::InsufficientFunds {
            available: 2_960,
            required: 3_010,
            ..
        })
    ));

    assert_eq!(runtime.balance_of(&alice.address), 2_960);
    assert_eq!(runtime.balance_of(&bob.address), 7_000);

    let metrics = runtime.metrics();
    assert_eq!(metrics.settled, 4);
    assert_eq!(metrics.rejected, 1);
}

// ---------------------------------------------------------------------------
// 2. Cross-shard settlement
// ---------------------------------------------------------------------------

#[test]
fn cross_shard_transfer_leaves_one_intent_and_no_overcredit() {
    let router = Arc::new(ShardRouter::with_shard_count(4));

    // Hunt for two accounts on different shards.
    let mut seed = 1u8;
    let from = loop {
        let account = Account::new(seed);
        if router.assign(&account.address) == 0 {
            break account;
        }
        seed += 1;
    };
    let to = loop {
        let account = Account::new(seed);
        if router.assign(&account.address) == 3 {
            break account;
        }
        seed += 1;
    };

    router.credit_genesis(&from.address, 50_000).unwrap();
    let genesis_total = router.total_balance();

    let tx = from.transfer(to.address, 12_000, 15, 1);
    assert!(verify_transaction(&tx).is_ok());
    router.settle(&tx).expect("funded cross-shard transfer");

    // Exactly one intent, carrying the right endpoints.
    let intent = router.pop_intent().expect("one intent enqueued");
    assert_eq!(intent.source_shard, 0);
    assert_eq!(intent.dest_shard, 3);
    assert_eq!(intent.tx_id, tx.id);
    assert!(router.pop_intent().is_none());

    // Neither shard over-credited: the books differ from genesis by the
    // burned fee and nothing else.
    assert_eq!(router.balance_of(&from.address), 50_000 - 12_015);
    assert_eq!(router.balance_of(&to.address), 12_000);
    assert_eq!(router.total_balance(), genesis_total - 15);
    router.audit_all().expect("state digests fresh");
}

// ---------------------------------------------------------------------------
// 3. Signature gate
// ---------------------------------------------------------------------------

#[test]
fn forged_and_unsigned_submissions_never_reach_the_mempool() {
    let runtime = build_runtime(approve_all());
    let alice = Account::new(1);
    let mallory = Account::new(66);
    runtime.router().credit_genesis(&alice.address, 10_000).unwrap();

    // Unsigned.
    let unsigned = TransactionBuilder::new()
        .from(alice.address)
        .to(mallory.address)
        .amount(1_000)
        .nonce(1)
        .timestamp(1_770_000_000_000)
        .build();
    assert!(matches!(
        runtime.submit(unsigned),
        Err(SubmitError::SignatureInvalid(_))
    ));

    // Signed by the wrong key: Mallory forges a spend of Alice's funds.
    let mut forged = TransactionBuilder::new()
        .from(alice.address)
        .to(mallory.address)
        .amount(1_000)
        .nonce(1)
        .timestamp(1_770_000_000_001)
        .build();
    forged.public_key = Some(mallory.keypair.public_key());
    forged.signature = Some(mallory.keypair.sign(forged.id.as_bytes()));
    assert!(matches!(
        runtime.submit(forged),
        Err(SubmitError::SignatureInvalid(_))
    ));

    assert!(runtime.mempool().is_empty());
    assert_eq!(runtime.balance_of(&alice.address), 10_000);
}

// ---------------------------------------------------------------------------
// 4. Consensus quorum behavior end-to-end
// ---------------------------------------------------------------------------

#[test]
fn quorum_gates_certification_and_rounds_always_advance() {
    // 21 validators: quorum is 15. A policy that approves from exactly 14
    // validators must fail; widening to 15 must certify. Both consume a
    // round.
    let pool = validator_pool(21);
    assert_eq!(quorum_threshold(pool.len()), 15);

    let fourteen: Vec<TrellisPublicKey> = pool[..14].to_vec();
    let narrow: Box<dyn VotePolicy + Send + Sync> =
        Box::new(move |v: &TrellisPublicKey, _: &Digest| fourteen.contains(v));

    let runtime = build_runtime(narrow);
    let alice = Account::new(1);
    runtime.router().credit_genesis(&alice.address, 10_000).unwrap();
    let batch = vec![alice.transfer(Account::new(2).address, 100, 1, 1)];

    assert!(!runtime.certify(&batch), "14 of 21 is short of quorum");
    let metrics = runtime.metrics();
    assert_eq!(metrics.rounds_run, 1);
    assert_eq!(metrics.batches_certified, 0);

    let fifteen: Vec<TrellisPublicKey> = pool[..15].to_vec();
    let wide: Box<dyn VotePolicy + Send + Sync> =
        Box::new(move |v: &TrellisPublicKey, _: &Digest| fifteen.contains(v));
    let runtime = build_runtime(wide);
    assert!(runtime.certify(&batch), "15 of 21 certifies");
    assert_eq!(runtime.metrics().batches_certified, 1);
}

// ---------------------------------------------------------------------------
// 5. Full pipeline under the workers
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn pipeline_settles_certifies_and_grows_the_dag() {
    let runtime = build_runtime(approve_all());
    let alice = Account::new(1);
    let bob = Account::new(2);
    runtime.router().credit_genesis(&alice.address, 1_000_000).unwrap();
    let genesis_total = runtime.router().total_balance();

    let handles = runtime.start();

    let tx_count = 50u64;
    let fee = 2u64;
    for nonce in 1..=tx_count {
        runtime
            .submit(alice.transfer(bob.address, 100, fee, nonce))
            .expect("admitted");
    }

    // Wait for the settlement worker to drain everything.
    for _ in 0..500 {
        if runtime.metrics().settled == tx_count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    runtime.stop();
    for handle in handles {
        handle.await.expect("workers exit at iteration boundaries");
    }

    let metrics = runtime.metrics();
    assert_eq!(metrics.settled, tx_count);
    assert_eq!(metrics.rejected, 0);
    assert_eq!(metrics.mempool_depth, 0);

    // Conservation: genesis minus burned fees, across all shards.
    assert_eq!(
        runtime.router().total_balance(),
        genesis_total - u128::from(tx_count * fee)
    );
    runtime.router().audit_all().expect("no corruption");

    // The consensus worker certified at least one overlapping batch and
    // appended it; the resulting chain is a valid DAG.
    assert!(metrics.rounds_run > 0);
    let graph = runtime.graph();
    if metrics.batches_certified > 0 {
        assert!(!graph.is_empty());
        assert!(!graph.cycle_exists());
        let order = graph.topological_order();
        assert_eq!(order.len(), graph.len());
    }
}

// ---------------------------------------------------------------------------
// 6. Ledger graph properties over realistic shapes
// ---------------------------------------------------------------------------

#[test]
fn dag_admission_ordering_and_diagnostics_compose() {
    let graph = LedgerGraph::new();

    // A genesis root, a chain, and a web of references onto it.
    let genesis = LedgerNode::new(Digest::ZERO, vec![], 1, 0, b"genesis".to_vec());
    let genesis_id = genesis.id;
    graph.insert(genesis).unwrap();

    let mut chain = vec![genesis_id];
    for i in 0..10u64 {
        let parent = *chain.last().unwrap();
        let refs = if i % 3 == 0 { vec![genesis_id] } else { vec![] };
        let node = LedgerNode::new(parent, refs, 2 + i, (i % 4) as u32, vec![]);
        chain.push(node.id);
        graph.insert(node).unwrap();
    }

    // A node referencing something that never existed is refused wholesale.
    let before_len = graph.len();
    let phantom = LedgerNode::new(Digest::ZERO, vec![], 999, 0, vec![]).id;
    let orphan = LedgerNode::new(*chain.last().unwrap(), vec![phantom], 100, 0, vec![]);
    assert!(graph.insert(orphan).is_err());
    assert_eq!(graph.len(), before_len, "rejection leaves the graph unchanged");

    // Diagnostics and ordering.
    assert!(!graph.cycle_exists());
    assert_eq!(graph.roots(), vec![genesis_id]);

    let order = graph.topological_order();
    assert_eq!(order.len(), graph.len(), "complete order means acyclic");
    let pos = |id: &Digest| order.iter().position(|x| x == id).unwrap();
    for window in chain.windows(2) {
        assert!(
            pos(&window[0]) < pos(&window[1]),
            "parents precede children"
        );
    }
}
