//! Adaptive quorum consensus.
//!
//! The engine does three things and refuses to do more:
//!
//! 1. **Mode selection** — a hysteresis-free step function from observed
//!    throughput to an operating point (`Fast`/`Balanced`/`Strict`),
//!    re-evaluated on every call but applied at most once per window.
//! 2. **Validator sampling** — deterministic-but-unpredictable selection
//!    from the registered pool, keyed by a VRF-style output of the engine's
//!    secret seed. Uniform sampling is the baseline; stake weighting is an
//!    extension point, not a feature.
//! 3. **Quorum evaluation** — given a batch and a vote per validator,
//!    certify iff favorable votes reach `floor(2n/3) + 1`.
//!
//! How a validator's vote is *obtained* is explicitly not this engine's
//! business. The [`VotePolicy`] trait is the seam: tests plug deterministic
//! policies, a production deployment plugs the networking layer's vote
//! collector, and the engine just counts. A failed quorum is an expected
//! outcome of normal operation, not an error.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{
    MODE_ADJUST_INTERVAL, ROUND_HISTORY_CAPACITY, TPS_BALANCED_CEILING, TPS_FAST_CEILING,
};
use crate::crypto::{batch_digest, hash_with_domain, Digest, TrellisPublicKey};
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// ConsensusMode
// ---------------------------------------------------------------------------

/// Operating point of the engine: a straight speed-for-safety dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsensusMode {
    /// Light load: favor latency.
    Fast,
    /// Moderate load: the default trade-off.
    Balanced,
    /// Heavy load: favor safety margins.
    Strict,
}

impl ConsensusMode {
    /// The step function from observed throughput to mode. No hysteresis —
    /// the thresholds are hard edges, re-evaluated every call.
    fn for_tps(observed_tps: u64) -> Self {
        if observed_tps < TPS_FAST_CEILING {
            Self::Fast
        } else if observed_tps < TPS_BALANCED_CEILING {
            Self::Balanced
        } else {
            Self::Strict
        }
    }
}

impl fmt::Display for ConsensusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "fast"),
            Self::Balanced => write!(f, "balanced"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

// ---------------------------------------------------------------------------
// VotePolicy
// ---------------------------------------------------------------------------

/// The pluggable vote source.
///
/// The engine asks the policy once per validator per round. Whether the
/// answer comes from local rules, a recorded network round-trip, or a test
/// script is invisible here — and no acceptance probability is ever assumed.
pub trait VotePolicy {
    /// Does `validator` vote in favor of certifying `batch`?
    fn vote(&self, validator: &TrellisPublicKey, batch: &Digest) -> bool;
}

impl<F> VotePolicy for F
where
    F: Fn(&TrellisPublicKey, &Digest) -> bool,
{
    fn vote(&self, validator: &TrellisPublicKey, batch: &Digest) -> bool {
        self(validator, batch)
    }
}

// ---------------------------------------------------------------------------
// ConsensusRound
// ---------------------------------------------------------------------------

/// Record of one certification round. Append-only within the round; the
/// engine keeps a bounded history for audit queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsensusRound {
    /// Monotonic round number.
    pub round: u32,
    /// Mode the engine was in when the round ran.
    pub mode: ConsensusMode,
    /// Digest the round proposed.
    pub proposed_batch_digest: Digest,
    /// Favorable-vote tally per proposed digest.
    pub vote_tally: HashMap<Digest, u32>,
}

// ---------------------------------------------------------------------------
// ConsensusEngine
// ---------------------------------------------------------------------------

/// Quorum threshold for `n` validators: `floor(2n/3) + 1`.
pub fn quorum_threshold(validator_count: usize) -> u32 {
    (2 * validator_count as u32 / 3) + 1
}

/// The adaptive consensus engine.
///
/// Round state is mutated only by the consensus worker; the engine needs
/// self-consistency, not cross-component locking (the runtime wraps it in
/// the lock its sharing requires).
pub struct ConsensusEngine {
    mode: ConsensusMode,
    round: u32,
    last_applied_adjustment: Option<Instant>,
    validator_pool: Vec<TrellisPublicKey>,
    vrf_seed: [u8; 32],
    history: VecDeque<ConsensusRound>,
}

impl ConsensusEngine {
    /// Creates an engine over a registered validator pool.
    ///
    /// `vrf_seed` is this node's sampling secret: selection is
    /// deterministic given the seed and round, unpredictable without it.
    pub fn new(validator_pool: Vec<TrellisPublicKey>, vrf_seed: [u8; 32]) -> Self {
        info!(
            validators = validator_pool.len(),
            "consensus engine initialized"
        );
        Self {
            mode: ConsensusMode::Balanced,
            round: 0,
            last_applied_adjustment: None,
            validator_pool,
            vrf_seed,
            history: VecDeque::new(),
        }
    }

    /// Current operating mode.
    pub fn mode(&self) -> ConsensusMode {
        self.mode
    }

    /// Current round number (the next round to run).
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Size of the registered validator pool.
    pub fn validator_pool_len(&self) -> usize {
        self.validator_pool.len()
    }

    /// Re-evaluates the operating mode against observed throughput.
    ///
    /// Rate-limited: a change is applied at most once per
    /// [`MODE_ADJUST_INTERVAL`]; calls inside the window are no-ops. The
    /// thresholds themselves are a plain step function with no hysteresis.
    pub fn adjust_mode(&mut self, observed_tps: u64) {
        self.adjust_mode_at(observed_tps, Instant::now());
    }

    fn adjust_mode_at(&mut self, observed_tps: u64, now: Instant) {
        if let Some(last) = self.last_applied_adjustment {
            if now.duration_since(last) < MODE_ADJUST_INTERVAL {
                return;
            }
        }
        self.last_applied_adjustment = Some(now);

        let next = ConsensusMode::for_tps(observed_tps);
        if next != self.mode {
            info!(tps = observed_tps, from = %self.mode, to = %next, "consensus mode change");
            self.mode = next;
        }
    }

    /// Samples `count` distinct validators from the pool.
    ///
    /// Keyed by `blake3(seed || round || count)` under a VRF domain tag, so
    /// the selection is reproducible for the current round and rotates with
    /// it. If `count` covers the whole pool, the pool is returned as-is.
    /// Uniform over the pool — stake weighting would slot in here and only
    /// here.
    pub fn select_validators(&self, count: u32) -> Vec<TrellisPublicKey> {
        let pool_len = self.validator_pool.len();
        if pool_len == 0 || count as usize >= pool_len {
            return self.validator_pool.clone();
        }

        let mut context = Vec::with_capacity(40);
        context.extend_from_slice(&self.vrf_seed);
        context.extend_from_slice(&self.round.to_le_bytes());
        context.extend_from_slice(&count.to_le_bytes());
        let vrf_output = hash_with_domain("trellis-vrf-select", &context);

        let mut selected = Vec::with_capacity(count as usize);
        let mut taken = vec![false; pool_len];
        let mut draw: u64 = 0;

        while selected.len() < count as usize {
            let mut pick_input = Vec::with_capacity(40);
            pick_input.extend_from_slice(vrf_output.as_bytes());
            pick_input.extend_from_slice(&draw.to_le_bytes());
            let pick_digest = hash_with_domain("trellis-vrf-pick", &pick_input);

            let raw = u64::from_le_bytes(
                pick_digest.as_bytes()[..8].try_into().expect("8 bytes"),
            );
            // Linear probe past already-taken slots keeps the loop bounded
            // even when consecutive draws collide.
            let mut idx = (raw % pool_len as u64) as usize;
            while taken[idx] {
                idx = (idx + 1) % pool_len;
            }
            taken[idx] = true;
            selected.push(self.validator_pool[idx]);
            draw += 1;
        }

        selected
    }

    /// Runs one certification round over `batch`.
    ///
    /// Computes the batch digest from the member transaction ids, collects
    /// one vote per supplied validator through `policy`, records the round
    /// (append-only tally, bounded history), and evaluates the quorum
    /// predicate. The round number increments exactly once per call —
    /// certification failures consume a round too.
    pub fn reach_consensus(
        &mut self,
        batch: &[Transaction],
        validators: &[TrellisPublicKey],
        policy: &dyn VotePolicy,
    ) -> bool {
        let proposed = batch_digest(&batch.iter().map(|tx| tx.id).collect::<Vec<_>>());
        let quorum = quorum_threshold(validators.len());

        let votes_in_favor = validators
            .iter()
            .filter(|v| policy.vote(v, &proposed))
            .count() as u32;

        let mut vote_tally = HashMap::new();
        vote_tally.insert(proposed, votes_in_favor);

        if self.history.len() == ROUND_HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(ConsensusRound {
            round: self.round,
            mode: self.mode,
            proposed_batch_digest: proposed,
            vote_tally,
        });
        self.round += 1;

        let certified = votes_in_favor >= quorum;
        debug!(
            round = self.round - 1,
            batch = %proposed,
            votes = votes_in_favor,
            quorum,
            certified,
            "consensus round evaluated"
        );
        certified
    }

    /// The most recently recorded round, if any.
    pub fn last_round(&self) -> Option<&ConsensusRound> {
        self.history.back()
    }

    /// Recorded round history, oldest first.
    pub fn round_history(&self) -> impl Iterator<Item = &ConsensusRound> {
        self.history.iter()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
