//! Positive-Negative counter CRDT.
//!
//! A PN-Counter supports increments and decrements across replicas. It keeps
//! two grow-only per-node maps (positive and negative); the value is
//! `sum(positive) - sum(negative)`. Merge takes the per-node maximum in each
//! map, which makes it commutative, associative, and idempotent.
//!
//! Used for the `quantity` and `acquired` attributes of items.

use basket_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A Positive-Negative counter.
///
/// Each participant tracks its own increments and decrements independently;
/// the per-node tallies only ever grow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PnCounter {
    positive: HashMap<NodeId, u64>,
    negative: HashMap<NodeId, u64>,
}

impl PnCounter {
    /// Creates a new counter with value 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter whose value starts at `initial`, attributed to the
    /// given participant.
    #[must_use]
    pub fn with_initial(node_id: &NodeId, initial: i64) -> Self {
        let mut counter = Self::new();
        counter.set_target(node_id, initial);
        counter
    }

    /// Increments the counter by `amount` for the given participant.
    pub fn increment(&mut self, node_id: &NodeId, amount: u64) {
        *self.positive.entry(node_id.clone()).or_insert(0) += amount;
    }

    /// Decrements the counter by `amount` for the given participant.
    pub fn decrement(&mut self, node_id: &NodeId, amount: u64) {
        *self.negative.entry(node_id.clone()).or_insert(0) += amount;
    }

    /// Moves the counter to a target value by applying the difference as an
    /// increment or decrement attributed to `node_id`.
    ///
    /// This is the bridge between the "set quantity to 5" surface the API
    /// exposes and the commutative delta the CRDT needs.
    pub fn set_target(&mut self, node_id: &NodeId, target: i64) {
        let delta = target - self.value();
        if delta > 0 {
            self.increment(node_id, delta as u64);
        } else if delta < 0 {
            self.decrement(node_id, delta.unsigned_abs());
        }
    }

    /// Returns the current counter value (may be negative).
    #[must_use]
    pub fn value(&self) -> i64 {
        let pos: u64 = self.positive.values().sum();
        let neg: u64 = self.negative.values().sum();
        pos as i64 - neg as i64
    }

    /// Merges another counter into this one (per-node max in both maps).
    pub fn merge(&mut self, other: &Self) {
        for (node_id, &count) in &other.positive {
            let entry = self.positive.entry(node_id.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
        for (node_id, &count) in &other.negative {
            let entry = self.negative.entry(node_id.clone()).or_insert(0);
            *entry = (*entry).max(count);
        }
    }

    /// Returns a new counter that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl PartialEq for PnCounter {
    fn eq(&self, other: &Self) -> bool {
        // Equality is per-node tallies, not just the visible value
        let pos_nodes: std::collections::HashSet<_> =
            self.positive.keys().chain(other.positive.keys()).collect();
        let neg_nodes: std::collections::HashSet<_> =
            self.negative.keys().chain(other.negative.keys()).collect();

        pos_nodes.into_iter().all(|n| {
            self.positive.get(n).copied().unwrap_or(0) == other.positive.get(n).copied().unwrap_or(0)
        }) && neg_nodes.into_iter().all(|n| {
            self.negative.get(n).copied().unwrap_or(0) == other.negative.get(n).copied().unwrap_or(0)
        })
    }
}

impl Eq for PnCounter {}
