//! # Node Runtime
//!
//! The thin orchestration layer over the core components: mempool admission,
//! the settlement and consensus worker loops, DAG appends for certified
//! batches, partition auditing, peer health observation, and the owned
//! metrics the node binary exports.
//!
//! ```text
//! mempool.rs      — single-lock FIFO pool with atomic batch extraction
//! orchestrator.rs — NodeRuntime: submit/settle/certify + workers
//! metrics.rs      — owned pipeline counters (no global state)
//! health.rs       — peer liveness table + scheduled sweep
//! ```

pub mod health;
pub mod mempool;
pub mod metrics;
pub mod orchestrator;

pub use health::{HealthMonitor, PeerHealth};
pub use mempool::{Mempool, MempoolConfig, MempoolError};
pub use metrics::RuntimeMetrics;
pub use orchestrator::{NodeRuntime, RuntimeConfig, SubmitError};
