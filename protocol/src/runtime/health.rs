//! Peer health observation.
//!
//! Tracks liveness signals for known peers and flags the ones that have
//! gone quiet, failed repeatedly, or dropped below the uptime floor.
//! Observation only: topology repair and peer replacement belong to the
//! networking layer, which reads [`HealthMonitor::detect_unhealthy`] and
//! acts on it.
//!
//! The monitor runs as a scheduled task with an explicit start/stop pair
//! and a watch-channel cancellation token. Its only suspension point is
//! the poll-interval sleep — it never parks inside the health table.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{HEALTH_POLL_INTERVAL, PEER_MAX_FAILURES, PEER_MIN_UPTIME_PCT, PEER_TIMEOUT};
use crate::crypto::TrellisPublicKey;

// ---------------------------------------------------------------------------
// PeerHealth
// ---------------------------------------------------------------------------

/// Rolling health record for one peer.
#[derive(Debug, Clone)]
pub struct PeerHealth {
    /// When the peer last reported in (alive or not).
    pub last_seen: Instant,
    /// Consecutive-ish failure counter: incremented on a dead report,
    /// decremented (floor zero) on a live one.
    pub failure_count: u32,
    /// Coarse uptime estimate derived from the failure counter.
    pub uptime_pct: f64,
    /// Whether the most recent report was a live one.
    pub healthy: bool,
}

impl PeerHealth {
    fn fresh(now: Instant) -> Self {
        Self {
            last_seen: now,
            failure_count: 0,
            uptime_pct: 100.0,
            healthy: true,
        }
    }

    /// A peer is anomalous if it timed out, failed too often, or its
    /// uptime estimate fell through the floor.
    fn is_anomalous(&self, now: Instant) -> bool {
        now.duration_since(self.last_seen) > PEER_TIMEOUT
            || self.failure_count >= PEER_MAX_FAILURES
            || self.uptime_pct < PEER_MIN_UPTIME_PCT
    }
}

// ---------------------------------------------------------------------------
// HealthMonitor
// ---------------------------------------------------------------------------

/// Concurrent peer-health table plus the scheduled sweep task.
pub struct HealthMonitor {
    peers: DashMap<TrellisPublicKey, PeerHealth>,
    shutdown: watch::Sender<bool>,
}

impl HealthMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            peers: DashMap::new(),
            shutdown,
        }
    }

    /// Records a liveness report for a peer. Safe to call concurrently
    /// from any number of connection handlers.
    pub fn record_heartbeat(&self, peer: TrellisPublicKey, alive: bool) {
        let now = Instant::now();
        let mut entry = self.peers.entry(peer).or_insert_with(|| PeerHealth::fresh(now));

        entry.last_seen = now;
        if alive {
            entry.failure_count = entry.failure_count.saturating_sub(1);
            entry.healthy = true;
        } else {
            entry.failure_count += 1;
            entry.healthy = false;
        }
        entry.uptime_pct = if entry.failure_count == 0 {
            100.0
        } else {
            (100.0 - f64::from(entry.failure_count) * 5.0).max(0.0)
        };
    }

    /// Peers currently flagged anomalous or dead.
    pub fn detect_unhealthy(&self) -> Vec<TrellisPublicKey> {
        let now = Instant::now();
        self.peers
            .iter()
            .filter(|entry| !entry.value().healthy || entry.value().is_anomalous(now))
            .map(|entry| *entry.key())
            .collect()
    }

    /// A copy of one peer's record.
    pub fn peer_health(&self, peer: &TrellisPublicKey) -> Option<PeerHealth> {
        self.peers.get(peer).map(|entry| entry.value().clone())
    }

    /// Number of tracked peers.
    pub fn tracked_peers(&self) -> usize {
        self.peers.len()
    }

    /// Drops a peer from the table entirely (e.g. after deliberate
    /// disconnect).
    pub fn forget(&self, peer: &TrellisPublicKey) {
        self.peers.remove(peer);
    }

    /// Spawns the periodic sweep. Each iteration logs the unhealthy set;
    /// the task exits at the next poll boundary after [`stop`](Self::stop).
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            info!("health monitor started");
            loop {
                if *shutdown.borrow_and_update() {
                    break;
                }

                let unhealthy = monitor.detect_unhealthy();
                if !unhealthy.is_empty() {
                    warn!(count = unhealthy.len(), "unhealthy peers detected");
                }

                tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
            }
            info!("health monitor stopped");
        })
    }

    /// Cancels the sweep task at its next poll boundary.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TrellisKeypair;

    fn peer(seed: u8) -> TrellisPublicKey {
        TrellisKeypair::from_seed(&[seed; 32]).public_key()
    }

    #[test]
    fn live_peer_is_healthy() {
        let monitor = HealthMonitor::new();
        monitor.record_heartbeat(peer(1), true);

        assert_eq!(monitor.tracked_peers(), 1);
        assert!(monitor.detect_unhealthy().is_empty());
        let health = monitor.peer_health(&peer(1)).expect("tracked");
        assert!(health.healthy);
        assert_eq!(health.uptime_pct, 100.0);
    }

    #[test]
    fn dead_report_flags_immediately() {
        let monitor = HealthMonitor::new();
        monitor.record_heartbeat(peer(1), false);
        assert_eq!(monitor.detect_unhealthy(), vec![peer(1)]);
    }

    #[test]
    fn repeated_failures_degrade_uptime() {
        let monitor = HealthMonitor::new();
        for _ in 0..4 {
            monitor.record_heartbeat(peer(1), false);
        }
        let health = monitor.peer_health(&peer(1)).expect("tracked");
        assert_eq!(health.failure_count, 4);
        assert_eq!(health.uptime_pct, 80.0);
    }

    #[test]
    fn recovery_clears_the_flag() {
        let monitor = HealthMonitor::new();
        monitor.record_heartbeat(peer(1), false);
        monitor.record_heartbeat(peer(1), true);

        let health = monitor.peer_health(&peer(1)).expect("tracked");
        assert!(health.healthy);
        assert_eq!(health.failure_count, 0);
        assert!(monitor.detect_unhealthy().is_empty());
    }

    #[test]
    fn sustained_failures_stay_anomalous_despite_one_recovery() {
        let monitor = HealthMonitor::new();
        for _ in 0..PEER_MAX_FAILURES + 2 {
            monitor.record_heartbeat(peer(1), false);
        }
        // One live report decrements the counter but the peer is still at
        // the failure ceiling.
        monitor.record_heartbeat(peer(1), true);
        assert_eq!(monitor.detect_unhealthy(), vec![peer(1)]);
    }

    #[test]
    fn forget_removes_tracking() {
        let monitor = HealthMonitor::new();
        monitor.record_heartbeat(peer(1), false);
        monitor.forget(&peer(1));
        assert_eq!(monitor.tracked_peers(), 0);
        assert!(monitor.detect_unhealthy().is_empty());
    }

    #[tokio::test]
    async fn sweep_task_stops_on_signal() {
        let monitor = Arc::new(HealthMonitor::new());
        let handle = monitor.start();
        monitor.stop();
        handle.await.expect("sweep exits at poll boundary");
    }
}
