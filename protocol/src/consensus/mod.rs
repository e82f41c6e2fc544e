//! # Consensus
//!
//! Load-adaptive quorum certification of settlement batches. The engine
//! picks an operating mode from observed throughput, samples validators
//! deterministically from a registered pool, and evaluates the 2/3+1 quorum
//! predicate over votes supplied by a pluggable [`VotePolicy`]. Network
//! vote collection is an external collaborator's job; this module only
//! counts.

pub mod engine;

pub use engine::{
    quorum_threshold, ConsensusEngine, ConsensusMode, ConsensusRound, VotePolicy,
};
