//! # Protocol Configuration & Constants
//!
//! Every magic number in Trellis lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the shape of a deployment. Several of them (shard
//! count above all) are consensus-critical: changing them after genesis
//! re-partitions every account and is somewhere between "difficult" and
//! "career-ending", so choose wisely before the first balance is seeded.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Identifier widths
// ---------------------------------------------------------------------------

/// Digest width in bytes. BLAKE3 output, used for ledger-node ids,
/// transaction ids, and state digests alike.
pub const DIGEST_LENGTH: usize = 32;

/// Account address width in bytes. Derived from a public key by hashing,
/// truncated to 20 bytes — compact enough for dense balance maps, long
/// enough that collisions are not a practical concern.
pub const ADDRESS_LENGTH: usize = 20;

/// Ed25519 public key width.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Ed25519 signature width. Always 64 bytes. If yours isn't, something
/// has gone terribly wrong.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Sharding
// ---------------------------------------------------------------------------

/// Number of account-state partitions. Fixed for the lifetime of a
/// deployment — `ShardRouter::assign` must map the same address to the
/// same shard forever, and live resharding is explicitly not supported.
pub const SHARD_COUNT: u32 = 256;

/// Capacity of each partition's recent-transaction ring. The oldest digest
/// is evicted FIFO once the ring is full.
pub const RECENT_TX_RING_CAPACITY: usize = 1_000;

// ---------------------------------------------------------------------------
// Consensus
// ---------------------------------------------------------------------------

/// Minimum validator sample size for batch certification.
pub const VALIDATOR_MINIMUM: u32 = 21;

/// Minimum interval between applied consensus-mode changes. `adjust_mode`
/// re-evaluates on every call but only applies a transition once per window.
pub const MODE_ADJUST_INTERVAL: Duration = Duration::from_secs(10);

/// Below this observed TPS the engine runs in `Fast` mode.
pub const TPS_FAST_CEILING: u64 = 1_000;

/// Below this observed TPS (and at or above [`TPS_FAST_CEILING`]) the
/// engine runs in `Balanced` mode; at or above it, `Strict`.
pub const TPS_BALANCED_CEILING: u64 = 10_000;

/// Number of past consensus rounds retained for audit queries. Round state
/// is append-only within a round; history beyond this bound is discarded
/// oldest-first.
pub const ROUND_HISTORY_CAPACITY: usize = 1_024;

// ---------------------------------------------------------------------------
// Mempool & batching
// ---------------------------------------------------------------------------

/// Maximum number of transactions the mempool will hold.
pub const MEMPOOL_CAPACITY: usize = 100_000;

/// Maximum transactions drained per settlement batch.
pub const SETTLEMENT_BATCH_SIZE: usize = 1_000;

/// Maximum transactions certified per consensus batch.
pub const CONSENSUS_BATCH_SIZE: usize = 100;

/// Settlement worker cadence — how long the worker sleeps when the mempool
/// comes up empty. Busy workers drain back-to-back without sleeping.
pub const SETTLEMENT_IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// Consensus worker cadence.
pub const CONSENSUS_INTERVAL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Health monitoring
// ---------------------------------------------------------------------------

/// A peer silent for longer than this is considered timed out.
pub const PEER_TIMEOUT: Duration = Duration::from_secs(30);

/// Consecutive failures before a peer is flagged unhealthy regardless of
/// recency.
pub const PEER_MAX_FAILURES: u32 = 5;

/// Minimum uptime percentage before a peer is flagged unhealthy.
pub const PEER_MIN_UPTIME_PCT: f64 = 80.0;

/// How often the health monitor and the partition auditor poll.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Node parameters (consumed by the binary)
// ---------------------------------------------------------------------------

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9652;

/// Protocol version string, assembled at compile time so we don't allocate
/// for something this trivial at runtime.
pub const PROTOCOL_VERSION: &str = "0.1.0";
