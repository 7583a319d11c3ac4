//! Vector clock for causality tracking.
//!
//! A vector clock tracks logical time per participant, enabling the store to
//! decide whether two versions of an entity are causally ordered or
//! concurrent. Every list and item carries one; the quorum read reconciler
//! and the client event consumer both branch on the comparison result.

use basket_types::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Causality relationship between two vector clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// First clock happened before second.
    Before,
    /// First clock happened after second.
    After,
    /// Clocks are concurrent (neither happened before the other).
    Concurrent,
    /// Clocks are identical.
    Equal,
}

/// A vector clock mapping participant ID to logical time.
///
/// Missing entries read as 0, so a freshly created clock compares `Before`
/// any clock with activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    clocks: HashMap<NodeId, u64>,
}

impl VectorClock {
    /// Creates a new empty vector clock.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clocks: HashMap::new(),
        }
    }

    /// Returns the logical time for a participant (0 if not present).
    #[must_use]
    pub fn get(&self, node_id: &NodeId) -> u64 {
        self.clocks.get(node_id).copied().unwrap_or(0)
    }

    /// Returns all participants and their times.
    pub fn entries(&self) -> impl Iterator<Item = (&NodeId, &u64)> {
        self.clocks.iter()
    }

    /// Returns the number of participants in the clock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    /// Returns true if the clock has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    /// Increments the clock for a participant and returns the new time.
    ///
    /// Called when the participant originates a new write.
    pub fn increment(&mut self, node_id: &NodeId) -> u64 {
        let entry = self.clocks.entry(node_id.clone()).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Raises the clock for a participant to a specific time.
    ///
    /// Only updates if the new time is greater than the current time.
    pub fn update(&mut self, node_id: &NodeId, time: u64) {
        let entry = self.clocks.entry(node_id.clone()).or_insert(0);
        if time > *entry {
            *entry = time;
        }
    }

    /// Merges another vector clock into this one.
    ///
    /// For each participant, takes the maximum of the two times. The result
    /// dominates both inputs. This operation is commutative, associative,
    /// and idempotent.
    pub fn merge(&mut self, other: &Self) {
        for (node_id, &time) in &other.clocks {
            let entry = self.clocks.entry(node_id.clone()).or_insert(0);
            if time > *entry {
                *entry = time;
            }
        }
    }

    /// Creates a new clock that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }

    /// Compares this clock with another to determine causal ordering.
    ///
    /// Exactly one of the four [`CausalOrder`] cases holds for any pair.
    #[must_use]
    pub fn compare(&self, other: &Self) -> CausalOrder {
        let mut self_greater = false;
        let mut other_greater = false;

        let all_nodes: HashSet<&NodeId> =
            self.clocks.keys().chain(other.clocks.keys()).collect();

        for node_id in all_nodes {
            let self_time = self.get(node_id);
            let other_time = other.get(node_id);

            if self_time > other_time {
                self_greater = true;
            }
            if other_time > self_time {
                other_greater = true;
            }
        }

        match (self_greater, other_greater) {
            (false, false) => CausalOrder::Equal,
            (true, false) => CausalOrder::After,
            (false, true) => CausalOrder::Before,
            (true, true) => CausalOrder::Concurrent,
        }
    }

    /// Returns true if this clock is causally before the other.
    #[must_use]
    pub fn is_before(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Before
    }

    /// Returns true if this clock is causally after the other.
    #[must_use]
    pub fn is_after(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::After
    }

    /// Returns true if this clock is concurrent with the other.
    #[must_use]
    pub fn is_concurrent(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Concurrent
    }

    /// Returns true if this clock dominates the other (>= for all entries).
    #[must_use]
    pub fn dominates(&self, other: &Self) -> bool {
        matches!(self.compare(other), CausalOrder::After | CausalOrder::Equal)
    }
}

impl PartialEq for VectorClock {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == CausalOrder::Equal
    }
}

impl Eq for VectorClock {}
