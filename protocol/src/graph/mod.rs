//! # Ledger Graph
//!
//! The causally-ordered DAG at the heart of the ledger. Each node names its
//! causal predecessors (one parent plus arbitrary references) by digest, and
//! the graph admits a node only when that closure is already resident —
//! which is what makes cycle checking a diagnostic here rather than a gate.
//!
//! Settlement does not flow through this module; the shard router owns the
//! hot path. The graph records what was certified, in what causal order.

pub mod dag;
pub mod node;

pub use dag::{GraphError, LedgerGraph};
pub use node::LedgerNode;
