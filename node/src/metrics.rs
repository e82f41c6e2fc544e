//! # Prometheus Metrics
//!
//! Maps the runtime's owned [`RuntimeMetrics`] snapshots onto Prometheus
//! handles and serves them at `/metrics`. The registry is dedicated — no
//! default-global-registry surprises — and the export path is strictly
//! one-way: the exporter reads snapshots, it never reaches into the core.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

use trellis_protocol::consensus::ConsensusMode;
use trellis_protocol::runtime::RuntimeMetrics;

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    /// Registry that owns every metric below.
    registry: Registry,
    /// Transactions settled successfully since startup.
    pub transactions_settled_total: IntCounter,
    /// Transactions rejected at settlement since startup.
    pub settlement_rejections_total: IntCounter,
    /// Settled transactions that crossed shards.
    pub cross_shard_transfers_total: IntCounter,
    /// Consensus rounds run.
    pub consensus_rounds_total: IntCounter,
    /// Batches that reached quorum.
    pub certified_batches_total: IntCounter,
    /// Current mempool depth.
    pub mempool_depth: IntGauge,
    /// Ledger-graph node count.
    pub graph_nodes: IntGauge,
    /// Cross-shard intents awaiting the reconciler.
    pub intent_backlog: IntGauge,
    /// Consensus mode as a gauge: 0 fast, 1 balanced, 2 strict.
    pub consensus_mode: IntGauge,
    /// Most recent observed settlement throughput.
    pub observed_tps: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("trellis".into()), None)
            .expect("failed to create prometheus registry");

        fn counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
            let c = IntCounter::new(name, help).expect("metric creation");
            registry.register(Box::new(c.clone())).expect("metric registration");
            c
        }
        fn gauge(registry: &Registry, name: &str, help: &str) -> IntGauge {
            let g = IntGauge::new(name, help).expect("metric creation");
            registry.register(Box::new(g.clone())).expect("metric registration");
            g
        }

        Self {
            transactions_settled_total: counter(
                &registry,
                "transactions_settled_total",
                "Transactions settled successfully",
            ),
            settlement_rejections_total: counter(
                &registry,
                "settlement_rejections_total",
                "Transactions rejected at settlement",
            ),
            cross_shard_transfers_total: counter(
                &registry,
                "cross_shard_transfers_total",
                "Settled transactions that crossed shards",
            ),
            consensus_rounds_total: counter(
                &registry,
                "consensus_rounds_total",
                "Consensus rounds run, certified or not",
            ),
            certified_batches_total: counter(
                &registry,
                "certified_batches_total",
                "Batches that reached quorum",
            ),
            mempool_depth: gauge(&registry, "mempool_depth", "Pending transactions in the mempool"),
            graph_nodes: gauge(&registry, "graph_nodes", "Nodes resident in the ledger graph"),
            intent_backlog: gauge(
                &registry,
                "intent_backlog",
                "Cross-shard intents awaiting the external reconciler",
            ),
            consensus_mode: gauge(
                &registry,
                "consensus_mode",
                "Consensus operating mode (0 fast, 1 balanced, 2 strict)",
            ),
            observed_tps: gauge(
                &registry,
                "observed_tps",
                "Most recent observed settlement throughput",
            ),
            registry,
        }
    }

    /// Applies a runtime snapshot to the Prometheus handles.
    ///
    /// Counters are advanced by the delta against their current value —
    /// snapshots are cumulative, Prometheus counters are monotonic, and
    /// the two line up exactly as long as this is the only writer.
    pub fn apply(&self, snapshot: &RuntimeMetrics) {
        fn advance(counter: &IntCounter, target: u64) {
            let current = counter.get();
            if target > current {
                counter.inc_by(target - current);
            }
        }

        advance(&self.transactions_settled_total, snapshot.settled);
        advance(&self.settlement_rejections_total, snapshot.rejected);
        advance(&self.cross_shard_transfers_total, snapshot.cross_shard);
        advance(&self.consensus_rounds_total, snapshot.rounds_run);
        advance(&self.certified_batches_total, snapshot.batches_certified);

        self.mempool_depth.set(snapshot.mempool_depth as i64);
        self.graph_nodes.set(snapshot.graph_nodes as i64);
        self.intent_backlog.set(snapshot.intent_backlog as i64);
        self.consensus_mode.set(match snapshot.mode {
            ConsensusMode::Fast => 0,
            ConsensusMode::Balanced => 1,
            ConsensusMode::Strict => 2,
        });
        self.observed_tps.set(snapshot.observed_tps as i64);
    }

    /// Encodes all registered metrics in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state for the axum handler.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler rendering `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(settled: u64) -> RuntimeMetrics {
        RuntimeMetrics {
            settled,
            rejected: 1,
            cross_shard: 2,
            batches_settled: 3,
            rounds_run: 4,
            batches_certified: 2,
            mempool_depth: 5,
            graph_nodes: 2,
            intent_backlog: 1,
            mode: ConsensusMode::Balanced,
            round: 4,
            observed_tps: 123,
        }
    }

    #[test]
    fn apply_advances_counters_monotonically() {
        let metrics = NodeMetrics::new();
        metrics.apply(&snapshot(10));
        assert_eq!(metrics.transactions_settled_total.get(), 10);

        metrics.apply(&snapshot(15));
        assert_eq!(metrics.transactions_settled_total.get(), 15);

        // A stale (lower) snapshot never winds a counter backwards.
        metrics.apply(&snapshot(12));
        assert_eq!(metrics.transactions_settled_total.get(), 15);
    }

    #[test]
    fn gauges_track_the_latest_snapshot() {
        let metrics = NodeMetrics::new();
        metrics.apply(&snapshot(1));
        assert_eq!(metrics.mempool_depth.get(), 5);
        assert_eq!(metrics.consensus_mode.get(), 1);
        assert_eq!(metrics.observed_tps.get(), 123);
    }

    #[test]
    fn encode_produces_text_format() {
        let metrics = NodeMetrics::new();
        metrics.apply(&snapshot(7));
        let body = metrics.encode().expect("encodes");
        assert!(body.contains("trellis_transactions_settled_total"));
        assert!(body.contains("trellis_mempool_depth"));
    }
}
