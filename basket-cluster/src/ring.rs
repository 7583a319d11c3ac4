//! Consistent-hash ring.
//!
//! Node identities and entity keys are hashed with the same 160-bit SHA-1
//! function onto a circle. The preference list for a key is the first N
//! distinct nodes clockwise from the key's position, wrapping at the end.
//! Because positions are fixed by hashing, adding or removing one node only
//! moves the keys between its predecessor and itself.

use basket_types::NodeId;
use sha1::{Digest, Sha1};
use tracing::debug;

/// A 160-bit ring position.
type Position = [u8; 20];

fn digest(input: &str) -> Position {
    let mut hasher = Sha1::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}

/// The fixed ring of storage nodes.
#[derive(Debug, Clone)]
pub struct HashRing {
    /// Node positions sorted by digest.
    positions: Vec<(Position, NodeId)>,
}

impl HashRing {
    /// Builds the ring from the cluster's node identities.
    #[must_use]
    pub fn new(nodes: impl IntoIterator<Item = NodeId>) -> Self {
        let mut positions: Vec<(Position, NodeId)> = nodes
            .into_iter()
            .map(|node| (digest(node.as_str()), node))
            .collect();
        positions.sort();
        positions.dedup_by(|a, b| a.1 == b.1);
        for (position, node) in &positions {
            debug!(node = %node, position = %hex::encode(position), "ring position");
        }
        Self { positions }
    }

    /// Number of nodes on the ring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if the ring has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The first `n` distinct nodes at or after the key's ring position,
    /// wrapping at the end of the ring.
    #[must_use]
    pub fn preference_list(&self, key: &str, n: usize) -> Vec<NodeId> {
        if self.positions.is_empty() || n == 0 {
            return Vec::new();
        }
        let key_pos = digest(key);
        let start = self
            .positions
            .partition_point(|(pos, _)| *pos < key_pos);

        let take = n.min(self.positions.len());
        let mut replicas = Vec::with_capacity(take);
        for offset in 0..self.positions.len() {
            let (_, node) = &self.positions[(start + offset) % self.positions.len()];
            if !replicas.contains(node) {
                replicas.push(node.clone());
                if replicas.len() == take {
                    break;
                }
            }
        }
        replicas
    }

    /// The node primarily responsible for a key.
    #[must_use]
    pub fn primary(&self, key: &str) -> Option<NodeId> {
        self.preference_list(key, 1).into_iter().next()
    }

    /// All nodes in ring order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.positions.iter().map(|(_, node)| node)
    }
}
