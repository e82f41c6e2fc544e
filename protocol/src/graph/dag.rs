//! The ledger DAG: insertion validation, cycle diagnostics, ordering.
//!
//! The graph enforces one structural rule at the door: a node is admitted
//! only when its entire declared causal closure — parent plus every
//! reference — is already resident. Under that rule a cycle cannot form
//! through normal insertion (a node can only point at nodes that were
//! inserted before it), which demotes [`LedgerGraph::cycle_exists`] from a
//! gate to a diagnostic: it exists to catch corruption, such as nodes
//! constructed around `insert`, not to police honest callers.
//!
//! ## Locking
//!
//! One mutex guards the whole graph; every operation holds it for its full
//! duration. That is deliberate — the graph is not the per-transaction hot
//! path (settlement runs through the shard router first), and callers must
//! not assume any finer-grained concurrency here.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use super::node::LedgerNode;
use crate::crypto::Digest;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a node is refused admission. Rejection never mutates the graph;
/// whether to retry after the missing predecessor arrives is the caller's
/// decision.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    /// A node with this id is already present.
    #[error("duplicate node {0}")]
    DuplicateNode(Digest),

    /// A declared causal predecessor is not resident.
    #[error("node {node} references missing predecessor {missing}")]
    MissingPredecessor {
        /// The node being inserted.
        node: Digest,
        /// The first absent predecessor found.
        missing: Digest,
    },
}

// ---------------------------------------------------------------------------
// LedgerGraph
// ---------------------------------------------------------------------------

/// DFS colors for the cycle diagnostic.
#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

#[derive(Default)]
struct GraphInner {
    nodes: HashMap<Digest, LedgerNode>,
    /// Forward edges (predecessor -> dependents), appended at insert time,
    /// so each list is naturally in insertion order.
    dependents: HashMap<Digest, Vec<Digest>>,
    /// Ids in admission order — drives deterministic tie-breaking in
    /// [`LedgerGraph::topological_order`].
    insertion_order: Vec<Digest>,
}

/// The causally-ordered ledger graph.
///
/// Thread safe; see the module docs for the (coarse) locking contract.
#[derive(Default)]
pub struct LedgerGraph {
    inner: Mutex<GraphInner>,
}

impl LedgerGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and inserts a node.
    ///
    /// Rejects without mutation if the id is already present or any
    /// declared predecessor is absent. On success the node is resident and
    /// immutable.
    pub fn insert(&self, node: LedgerNode) -> Result<(), GraphError> {
        let mut inner = self.inner.lock();

        if inner.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }

        for pred in node.predecessors() {
            if !inner.nodes.contains_key(pred) {
                return Err(GraphError::MissingPredecessor {
                    node: node.id,
                    missing: *pred,
                });
            }
        }

        let id = node.id;
        for pred in node.predecessors() {
            inner.dependents.entry(*pred).or_default().push(id);
        }
        inner.insertion_order.push(id);
        inner.nodes.insert(id, node);

        debug!(node = %id, "ledger node inserted");
        Ok(())
    }

    /// Returns a copy of the node with the given id.
    pub fn get(&self, id: &Digest) -> Option<LedgerNode> {
        self.inner.lock().nodes.get(id).cloned()
    }

    /// Returns `true` if a node with this id is resident.
    pub fn contains(&self, id: &Digest) -> bool {
        self.inner.lock().nodes.contains_key(id)
    }

    /// Number of resident nodes.
    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    /// Returns `true` if the graph holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().nodes.is_empty()
    }

    /// Ids of all nodes with no causal predecessors at all (sentinel parent
    /// and empty references), in insertion order.
    pub fn roots(&self) -> Vec<Digest> {
        let inner = self.inner.lock();
        inner
            .insertion_order
            .iter()
            .filter(|id| inner.nodes[id].is_root())
            .copied()
            .collect()
    }

    /// Whole-graph cycle diagnostic: three-color DFS over parent and
    /// reference edges, `true` on the first back-edge into a gray node.
    /// O(V + E).
    ///
    /// Given the insertion invariant this must always return `false`; a
    /// `true` here means the graph was corrupted outside `insert` and the
    /// owning subsystem should halt rather than keep ordering on top of it.
    pub fn cycle_exists(&self) -> bool {
        let inner = self.inner.lock();

        let mut colors: HashMap<Digest, Color> =
            inner.nodes.keys().map(|id| (*id, Color::White)).collect();

        for start in inner.nodes.keys() {
            if colors[start] != Color::White {
                continue;
            }

            // Iterative DFS; frames carry (node, next-predecessor-index) so
            // deep ancestries can't blow the call stack.
            let mut stack: Vec<(Digest, usize)> = vec![(*start, 0)];
            colors.insert(*start, Color::Gray);

            while let Some((current, edge_idx)) = stack.pop() {
                let preds: Vec<Digest> =
                    inner.nodes[&current].predecessors().copied().collect();

                if edge_idx < preds.len() {
                    stack.push((current, edge_idx + 1));
                    let next = preds[edge_idx];
                    match colors.get(&next).copied() {
                        Some(Color::Gray) => return true,
                        Some(Color::White) => {
                            colors.insert(next, Color::Gray);
                            stack.push((next, 0));
                        }
                        // Black, or an edge to a node that is not resident
                        // (itself corruption, but not a cycle).
                        _ => {}
                    }
                } else {
                    colors.insert(current, Color::Black);
                }
            }
        }

        false
    }

    /// Kahn's-algorithm topological order: every node appears exactly once,
    /// and only after all of its parents and references.
    ///
    /// Ties among simultaneously-ready nodes break by insertion order into
    /// the ready queue — NOT digest order; callers must not assume sorted
    /// output. If the graph were cyclic (impossible via `insert`) the
    /// result would be shorter than `len()`; callers treat a length
    /// mismatch as their corruption signal, not this method.
    pub fn topological_order(&self) -> Vec<Digest> {
        let inner = self.inner.lock();

        let mut in_degree: HashMap<Digest, usize> = inner
            .nodes
            .iter()
            .map(|(id, node)| (*id, node.predecessors().count()))
            .collect();

        // Seed with ready nodes in insertion order.
        let mut queue: VecDeque<Digest> = inner
            .insertion_order
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .copied()
            .collect();

        let mut order = Vec::with_capacity(inner.nodes.len());
        while let Some(current) = queue.pop_front() {
            order.push(current);

            if let Some(deps) = inner.dependents.get(&current) {
                // Dependent lists are appended at insert time, so iterating
                // them preserves the insertion-order tie-break.
                for dep in deps {
                    let d = in_degree.get_mut(dep).expect("dependent is resident");
                    *d -= 1;
                    if *d == 0 {
                        queue.push_back(*dep);
                    }
                }
            }
        }

        order
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
