// Copyright (c) 2026 Meshwork Labs. MIT License.
// See LICENSE for details.

//! # Trellis Validator Node
//!
//! Entry point for the `trellis-node` binary. Parses CLI arguments,
//! initializes logging and metrics, assembles the protocol runtime, and
//! runs the settlement/consensus workers until interrupted.
//!
//! Subcommands:
//!
//! - `run`     — start the node
//! - `keygen`  — generate and print a fresh node keypair
//! - `version` — print build version information

mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use trellis_protocol::config;
use trellis_protocol::consensus::ConsensusEngine;
use trellis_protocol::crypto::{hash_with_domain, Digest, TrellisKeypair, TrellisPublicKey};
use trellis_protocol::graph::LedgerGraph;
use trellis_protocol::ledger::ShardRouter;
use trellis_protocol::runtime::{
    HealthMonitor, Mempool, MempoolConfig, NodeRuntime, RuntimeConfig,
};
use trellis_protocol::transaction::Address;

use cli::{Commands, TrellisNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;

/// How often runtime counters are pushed into the Prometheus handles.
const METRICS_REFRESH: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = TrellisNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Keygen => {
            print_keygen();
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full node: runtime workers, health monitor, metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "trellis_node=info,trellis_protocol=info",
        LogFormat::from_str_lossy(&args.log_format),
    );

    tracing::info!(
        metrics_port = args.metrics_port,
        shards = config::SHARD_COUNT,
        validator_pool = args.validator_pool,
        "starting trellis-node"
    );

    // --- Node identity ---
    let keypair = match &args.node_key {
        Some(hex_key) => keypair_from_hex(hex_key).context("invalid --node-key")?,
        None => {
            tracing::warn!("no node key supplied; generating an ephemeral identity");
            TrellisKeypair::generate()
        }
    };
    tracing::info!(public_key = %keypair.public_key(), "node identity loaded");

    // --- Core components ---
    let router = Arc::new(ShardRouter::new());
    let graph = Arc::new(LedgerGraph::new());
    let mempool = Arc::new(Mempool::new(MempoolConfig::default()));

    // The sampling seed is private to this node: derived from the node key
    // under a dedicated domain so the key itself never doubles as a seed.
    let vrf_seed = *hash_with_domain("trellis-vrf-seed", &keypair.secret_key_bytes()).as_bytes();
    let validator_pool = devnet_validator_pool(args.validator_pool);
    let engine = ConsensusEngine::new(validator_pool, vrf_seed);

    // Single-node deployment: every sampled validator approves locally.
    // Real vote collection belongs to the networking layer, which replaces
    // this closure wholesale when it arrives.
    let self_approve = Box::new(|_: &TrellisPublicKey, _: &Digest| true);

    let runtime = Arc::new(NodeRuntime::new(
        Arc::clone(&router),
        graph,
        mempool,
        engine,
        self_approve,
        keypair,
        RuntimeConfig::default(),
    ));

    // --- Genesis ---
    seed_genesis(&router, args.genesis_accounts, args.genesis_balance)?;

    // --- Workers ---
    let worker_handles = runtime.start();

    let health = Arc::new(HealthMonitor::new());
    let health_handle = health.start();

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new());
    let metrics_pump = {
        let runtime = Arc::clone(&runtime);
        let node_metrics = Arc::clone(&node_metrics);
        tokio::spawn(async move {
            loop {
                node_metrics.apply(&runtime.metrics());
                tokio::time::sleep(METRICS_REFRESH).await;
            }
        })
    };

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {metrics_addr}"))?;
    tracing::info!("metrics server listening on {metrics_addr}");

    // --- Serve until interrupted ---
    tokio::select! {
        res = axum::serve(metrics_listener, metrics_router) => {
            res.context("metrics server failed")?;
        }
        _ = signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
    }

    // --- Cooperative shutdown ---
    runtime.stop();
    health.stop();
    metrics_pump.abort();
    for handle in worker_handles {
        let _ = handle.await;
    }
    let _ = health_handle.await;

    tracing::info!("trellis-node stopped");
    Ok(())
}

/// Parses a hex-encoded 32-byte Ed25519 secret key.
fn keypair_from_hex(hex_key: &str) -> Result<TrellisKeypair> {
    let bytes = hex::decode(hex_key).context("node key is not valid hex")?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("node key must be exactly 32 bytes"))?;
    Ok(TrellisKeypair::from_seed(&seed))
}

/// A deterministic devnet validator pool. Public keys only — the node never
/// holds other validators' secrets, it just needs a stable pool to sample.
fn devnet_validator_pool(count: u32) -> Vec<TrellisPublicKey> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[..4].copy_from_slice(&(i + 1).to_le_bytes());
            TrellisKeypair::from_seed(&seed).public_key()
        })
        .collect()
}

/// Seeds deterministic dev accounts so a fresh devnet has something to
/// transfer. Account seeds follow a fixed convention clients reproduce.
fn seed_genesis(router: &ShardRouter, accounts: u32, balance: u64) -> Result<()> {
    for i in 0..accounts {
        let mut seed = [0xD0u8; 32];
        seed[..4].copy_from_slice(&(i + 1).to_le_bytes());
        let address = Address::from_public_key(&TrellisKeypair::from_seed(&seed).public_key());
        router
            .credit_genesis(&address, balance)
            .map_err(|e| anyhow::anyhow!("genesis seeding failed: {e}"))?;
        tracing::info!(account = %address, balance, shard = router.assign(&address), "genesis account seeded");
    }
    Ok(())
}

/// Prints a freshly generated keypair. The secret goes to stdout by design
/// — this command exists to mint identities, redirect accordingly.
fn print_keygen() {
    let keypair = TrellisKeypair::generate();
    println!("secret: {}", hex::encode(keypair.secret_key_bytes()));
    println!("public: {}", keypair.public_key());
    println!(
        "address: {}",
        Address::from_public_key(&keypair.public_key())
    );
}

/// Prints version information.
fn print_version() {
    println!(
        "trellis-node {} (protocol {})",
        env!("CARGO_PKG_VERSION"),
        config::PROTOCOL_VERSION,
    );
}
