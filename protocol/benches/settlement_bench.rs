// Settlement benchmarks for the Trellis protocol.
//
// Covers shard assignment, same-shard and cross-shard settlement, and
// batch settlement throughput at several batch sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use trellis_protocol::ledger::ShardRouter;
use trellis_protocol::transaction::{Address, Transaction, TransactionBuilder};

/// Finds the `nth` distinct address the router maps to `shard`.
fn addr_on_shard(router: &ShardRouter, shard: u32, nth: usize) -> Address {
    let mut found = 0usize;
    for b in 0..=255u8 {
        for c in 0..=255u8 {
            let mut bytes = [b; 20];
            bytes[19] = c;
            let candidate = Address::from_bytes(bytes);
            if router.assign(&candidate) == shard {
                if found == nth {
                    return candidate;
                }
                found += 1;
            }
        }
    }
    unreachable!("every shard is reachable from some address");
}

fn transfer(from: Address, to: Address, nonce: u64) -> Transaction {
    TransactionBuilder::new()
        .from(from)
        .to(to)
        .amount(100)
        .fee(1)
        .nonce(nonce)
        .timestamp(1_770_000_000_000 + nonce)
        .build()
}

fn bench_assign(c: &mut Criterion) {
    let router = ShardRouter::new();
    let address = Address::from_bytes([0x5A; 20]);

    c.bench_function("settlement/assign", |b| {
        b.iter(|| router.assign(&address));
    });
}

fn bench_same_shard_settle(c: &mut Criterion) {
    let router = ShardRouter::with_shard_count(8);
    let from = addr_on_shard(&router, 1, 0);
    let to = addr_on_shard(&router, 1, 1);
    router.credit_genesis(&from, u64::MAX / 2).unwrap();

    let mut nonce = 0u64;
    c.bench_function("settlement/same_shard", |b| {
        b.iter(|| {
            nonce += 1;
            router.settle(&transfer(from, to, nonce)).unwrap();
        });
    });
}

fn bench_cross_shard_settle(c: &mut Criterion) {
    let router = ShardRouter::with_shard_count(8);
    let from = addr_on_shard(&router, 1, 0);
    let to = addr_on_shard(&router, 5, 0);
    router.credit_genesis(&from, u64::MAX / 2).unwrap();

    let mut nonce = 0u64;
    c.bench_function("settlement/cross_shard", |b| {
        b.iter(|| {
            nonce += 1;
            router.settle(&transfer(from, to, nonce)).unwrap();
        });
    });
}

fn bench_settle_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("settlement/batch");

    for batch_size in [100usize, 500, 1_000] {
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &batch_size,
            |b, &size| {
                b.iter_with_setup(
                    || {
                        let router = ShardRouter::with_shard_count(8);
                        let from = addr_on_shard(&router, 0, 0);
                        let to = addr_on_shard(&router, 4, 0);
                        router.credit_genesis(&from, u64::MAX / 2).unwrap();
                        let txs: Vec<Transaction> = (0..size as u64)
                            .map(|n| transfer(from, to, n + 1))
                            .collect();
                        (router, txs)
                    },
                    |(router, txs)| {
                        let (results, _) = router.settle_batch(&txs);
                        assert!(results.iter().all(|(_, r)| r.is_ok()));
                    },
                );
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_assign,
    bench_same_shard_settle,
    bench_cross_shard_settle,
    bench_settle_batch,
);
criterion_main!(benches);
