//! A guided tour of the Trellis core: accounts, submission, settlement,
//! certification, and the ledger DAG — the same pipeline the node binary
//! runs, driven by hand.
//!
//! Run with: `cargo run --example demo -p trellis-protocol`

use std::sync::Arc;

use trellis_protocol::consensus::ConsensusEngine;
use trellis_protocol::crypto::{Digest, TrellisKeypair, TrellisPublicKey};
use trellis_protocol::graph::LedgerGraph;
use trellis_protocol::ledger::ShardRouter;
use trellis_protocol::runtime::{Mempool, MempoolConfig, NodeRuntime, RuntimeConfig};
use trellis_protocol::transaction::{sign_transaction, Address, TransactionBuilder};

fn main() {
    // --- Identities ---
    let alice_kp = TrellisKeypair::generate();
    let bob_kp = TrellisKeypair::generate();
    let alice = Address::from_public_key(&alice_kp.public_key());
    let bob = Address::from_public_key(&bob_kp.public_key());
    println!("alice: {alice}");
    println!("bob:   {bob}");

    // --- Assemble the core ---
    let router = Arc::new(ShardRouter::new());
    println!(
        "alice lives on shard {}, bob on shard {}",
        router.assign(&alice),
        router.assign(&bob)
    );

    let validator_pool: Vec<TrellisPublicKey> =
        (0..21).map(|_| TrellisKeypair::generate().public_key()).collect();
    let engine = ConsensusEngine::new(validator_pool, [1u8; 32]);
    let approve_all = Box::new(|_: &TrellisPublicKey, _: &Digest| true);

    let runtime = Arc::new(NodeRuntime::new(
        Arc::clone(&router),
        Arc::new(LedgerGraph::new()),
        Arc::new(Mempool::new(MempoolConfig::default())),
        engine,
        approve_all,
        TrellisKeypair::generate(),
        RuntimeConfig::default(),
    ));

    // --- Fund and transfer ---
    router.credit_genesis(&alice, 10_000).expect("genesis");

    let mut tx = TransactionBuilder::new()
        .from(alice)
        .to(bob)
        .amount(2_500)
        .fee(10)
        .nonce(1)
        .build();
    sign_transaction(&mut tx, &alice_kp).expect("alice signs her own spend");

    let tx_id = runtime.submit(tx).expect("verified and admitted");
    println!("submitted {tx_id}");

    // --- Settle the batch ---
    let batch = runtime.mempool().drain(100);
    for (id, outcome) in runtime.settle_batch(&batch) {
        println!("settled {id}: {outcome:?}");
    }
    println!("alice now holds {}", runtime.balance_of(&alice));
    println!("bob now holds   {}", runtime.balance_of(&bob));

    // --- Certify and append to the DAG ---
    if runtime.certify(&batch) {
        let node = runtime.append_certified_batch(&batch).expect("appended");
        println!("certified batch appended as graph node {node}");
    }

    let metrics = runtime.metrics();
    println!(
        "settled={} rejected={} cross_shard={} rounds={} mode={}",
        metrics.settled, metrics.rejected, metrics.cross_shard, metrics.rounds_run, metrics.mode
    );
}
