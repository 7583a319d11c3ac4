//! Last-Writer-Wins register.
//!
//! Stores a single value. Concurrent writes are resolved by comparing
//! timestamps; the write with the higher timestamp wins, and a timestamp tie
//! is broken by the lexicographically greater writer ID, so every replica
//! picks the same winner.
//!
//! Used for the `name` attribute of lists and items.

use basket_types::{NodeId, Timestamp};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A Last-Writer-Wins register.
///
/// Holds a value of type `T` together with the metadata needed for conflict
/// resolution: the timestamp of the last write and the writer that made it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LwwRegister<T> {
    value: T,
    timestamp: Timestamp,
    writer: NodeId,
}

impl<T> LwwRegister<T> {
    /// Creates a new register with the given initial value.
    #[must_use]
    pub fn new(value: T, writer: NodeId) -> Self {
        Self {
            value,
            timestamp: Timestamp::now(),
            writer,
        }
    }

    /// Creates a register with an explicit timestamp (for replication or
    /// replay of a wire payload).
    #[must_use]
    pub fn with_timestamp(value: T, timestamp: Timestamp, writer: NodeId) -> Self {
        Self {
            value,
            timestamp,
            writer,
        }
    }

    /// Returns a reference to the current value.
    #[must_use]
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Returns the timestamp of the last write.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Returns the writer of the last write.
    #[must_use]
    pub fn writer(&self) -> &NodeId {
        &self.writer
    }

    /// Sets a new value, stamping it with the current wall clock.
    ///
    /// The stamp never regresses: if the clock has not advanced past the
    /// previous write, the previous stamp is bumped by one millisecond.
    pub fn set(&mut self, value: T, writer: NodeId) {
        self.timestamp = self.timestamp.advance();
        self.value = value;
        self.writer = writer;
    }

    /// Sets a new value with an explicit timestamp.
    ///
    /// Only updates if the incoming write would win the LWW comparison.
    /// Returns true if the value was adopted.
    pub fn set_with_timestamp(&mut self, value: T, timestamp: Timestamp, writer: NodeId) -> bool {
        if self.should_adopt(timestamp, &writer) {
            self.value = value;
            self.timestamp = timestamp;
            self.writer = writer;
            true
        } else {
            false
        }
    }

    /// Decides whether an incoming write wins over the current value.
    fn should_adopt(&self, timestamp: Timestamp, writer: &NodeId) -> bool {
        match timestamp.cmp(&self.timestamp) {
            Ordering::Greater => true,
            Ordering::Less => false,
            // Tie-breaker: lexicographic writer comparison, deterministic
            // across replicas
            Ordering::Equal => *writer > self.writer,
        }
    }
}

impl<T: Clone> LwwRegister<T> {
    /// Merges another register into this one.
    ///
    /// The value with the higher timestamp (or greater writer on tie) wins.
    /// Commutative, associative, idempotent.
    pub fn merge(&mut self, other: &Self) {
        if self.should_adopt(other.timestamp, &other.writer) {
            self.value = other.value.clone();
            self.timestamp = other.timestamp;
            self.writer = other.writer.clone();
        }
    }

    /// Creates a new register that is the merge of this and another.
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.merge(other);
        result
    }
}

impl<T: PartialEq> PartialEq for LwwRegister<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.timestamp == other.timestamp
    }
}

impl<T: Eq> Eq for LwwRegister<T> {}
