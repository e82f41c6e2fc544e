//! Ledger graph node type.

use serde::{Deserialize, Serialize};

use crate::crypto::{hash_parts, Digest, TrellisKeypair, TrellisSignature};

/// A node in the ledger DAG.
///
/// Created once, immutable thereafter. The `id` commits to every causal
/// field — parent, references, timestamp, shard, payload — so two nodes
/// with the same causal content are the same node. The certifier signature
/// is excluded from the id for the same reason transaction signatures are
/// excluded from transaction ids: identity must be computable before
/// certification.
///
/// `parent` uses [`Digest::ZERO`] as the "no parent" sentinel; `references`
/// lists additional causal predecessors beyond the parent. A node may only
/// enter the graph once every one of those predecessors is already present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerNode {
    /// Node id: `blake3(parent || references || timestamp_ns || shard || payload)`.
    pub id: Digest,

    /// Primary causal predecessor, or [`Digest::ZERO`] for a root.
    pub parent: Digest,

    /// Additional causal predecessors, in declaration order.
    pub references: Vec<Digest>,

    /// Creation time in nanoseconds, from the runtime's monotonic source.
    pub timestamp_ns: u64,

    /// Shard whose settlement this node records.
    pub shard: u32,

    /// Opaque payload — for certified batches, the 32 batch-digest bytes.
    pub payload: Vec<u8>,

    /// Signature of the certifying node over the id, attached after
    /// consensus. `None` for uncertified nodes.
    pub certifier_signature: Option<TrellisSignature>,
}

impl LedgerNode {
    /// Constructs a node and computes its id from the causal fields.
    pub fn new(
        parent: Digest,
        references: Vec<Digest>,
        timestamp_ns: u64,
        shard: u32,
        payload: Vec<u8>,
    ) -> Self {
        let mut node = Self {
            id: Digest::ZERO,
            parent,
            references,
            timestamp_ns,
            shard,
            payload,
            certifier_signature: None,
        };
        node.id = node.compute_id();
        node
    }

    /// Recomputes the id from the causal fields.
    pub fn compute_id(&self) -> Digest {
        let ts = self.timestamp_ns.to_le_bytes();
        let shard = self.shard.to_le_bytes();

        let mut parts: Vec<&[u8]> = Vec::with_capacity(4 + self.references.len());
        parts.push(self.parent.as_bytes());
        for r in &self.references {
            parts.push(r.as_bytes());
        }
        parts.push(&ts);
        parts.push(&shard);
        parts.push(&self.payload);

        hash_parts(&parts)
    }

    /// Attaches the certifier's signature over the node id.
    pub fn certify(mut self, keypair: &TrellisKeypair) -> Self {
        self.certifier_signature = Some(keypair.sign(self.id.as_bytes()));
        self
    }

    /// Returns `true` if this node declares no causal predecessors.
    pub fn is_root(&self) -> bool {
        self.parent.is_zero() && self.references.is_empty()
    }

    /// Every declared causal predecessor: the parent (if any) followed by
    /// the references.
    pub fn predecessors(&self) -> impl Iterator<Item = &Digest> {
        let parent = (!self.parent.is_zero()).then_some(&self.parent);
        parent.into_iter().chain(self.references.iter())
    }
}
