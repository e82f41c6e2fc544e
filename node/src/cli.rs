//! # CLI Interface
//!
//! Command-line argument structure for `trellis-node`, via `clap` derive.
//! Three subcommands: `run`, `keygen`, and `version`.

use clap::{Parser, Subcommand};

/// Trellis validator node.
///
/// Runs the full settlement and certification pipeline: mempool, sharded
/// settlement, adaptive consensus, ledger DAG, and a Prometheus metrics
/// endpoint.
#[derive(Parser, Debug)]
#[command(
    name = "trellis-node",
    about = "Trellis permissioned DAG-ledger node",
    version,
    propagate_version = true
)]
pub struct TrellisNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Generate a fresh Ed25519 keypair and print it (hex).
    Keygen,
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "TRELLIS_METRICS_PORT", default_value_t = trellis_protocol::config::DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Hex-encoded Ed25519 node private key.
    ///
    /// When omitted, an ephemeral keypair is generated at startup — fine
    /// for a devnet, useless for anything that must survive a restart.
    /// **Never pass this flag on a shared machine**; use the environment
    /// variable.
    #[arg(long, env = "TRELLIS_NODE_KEY")]
    pub node_key: Option<String>,

    /// Genesis balance seeded to each generated dev account.
    #[arg(long, default_value_t = 1_000_000_000)]
    pub genesis_balance: u64,

    /// Number of dev accounts to seed at genesis.
    #[arg(long, default_value_t = 4)]
    pub genesis_accounts: u32,

    /// Number of validators registered in the consensus pool.
    #[arg(long, default_value_t = 21)]
    pub validator_pool: u32,

    /// Log output format: "pretty" or "json".
    #[arg(long, env = "TRELLIS_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}
