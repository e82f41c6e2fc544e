// Consensus engine benchmarks for the Trellis protocol.
//
// Covers validator sampling and full certification rounds at several
// validator-pool sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trellis_protocol::consensus::ConsensusEngine;
use trellis_protocol::crypto::{Digest, TrellisKeypair, TrellisPublicKey};
use trellis_protocol::transaction::{Address, Transaction, TransactionBuilder};

fn pool(n: usize) -> Vec<TrellisPublicKey> {
    (0..n)
        .map(|i| TrellisKeypair::from_seed(&[(i % 251) as u8 + 1; 32]).public_key())
        .collect()
}

fn batch(len: u64) -> Vec<Transaction> {
    (0..len)
        .map(|i| {
            TransactionBuilder::new()
                .from(Address::from_bytes([1; 20]))
                .to(Address::from_bytes([2; 20]))
                .amount(100 + i)
                .nonce(i + 1)
                .timestamp(1_770_000_000_000 + i)
                .build()
        })
        .collect()
}

fn bench_select_validators(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/select_validators");

    for pool_size in [50usize, 200, 1_000] {
        group.bench_with_input(
            BenchmarkId::from_parameter(pool_size),
            &pool_size,
            |b, &n| {
                let engine = ConsensusEngine::new(pool(n), [7u8; 32]);
                b.iter(|| engine.select_validators(21));
            },
        );
    }

    group.finish();
}

fn bench_reach_consensus(c: &mut Criterion) {
    let mut group = c.benchmark_group("consensus/reach_consensus");
    let approve = |_: &TrellisPublicKey, _: &Digest| true;

    for batch_size in [10u64, 100, 1_000] {
        group.throughput(Throughput::Elements(batch_size));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                let mut engine = ConsensusEngine::new(pool(30), [7u8; 32]);
                let validators = engine.select_validators(21);
                let txs = batch(size);
                b.iter(|| engine.reach_consensus(&txs, &validators, &approve));
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_select_validators, bench_reach_consensus);
criterion_main!(benches);
