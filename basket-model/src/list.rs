//! The list aggregate.

use crate::wire::ListRecord;
use basket_crdt::{LwwRegister, VectorClock};
use basket_types::{ListId, NodeId, Timestamp};
use serde::{Deserialize, Serialize};

/// A shopping list.
///
/// Items are not embedded; they live in the add-wins item set and reference
/// their list by id. The list itself only carries an LWW name and the usual
/// CRDT metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    id: ListId,
    name: LwwRegister<String>,
    created_at: Timestamp,
    last_updated: Timestamp,
    vector_clock: VectorClock,
}

impl List {
    /// Creates a new list written by `writer`.
    #[must_use]
    pub fn new(id: ListId, name: String, writer: &NodeId) -> Self {
        let now = Timestamp::now();
        let mut vector_clock = VectorClock::new();
        vector_clock.increment(writer);
        Self {
            id,
            name: LwwRegister::with_timestamp(name, now, writer.clone()),
            created_at: now,
            last_updated: now,
            vector_clock,
        }
    }

    /// Rebuilds a list from its plain-value record.
    #[must_use]
    pub fn from_record(record: &ListRecord, seed: &NodeId) -> Self {
        Self {
            id: record.id,
            name: LwwRegister::with_timestamp(
                record.name.clone(),
                record.last_updated,
                seed.clone(),
            ),
            created_at: record.created_at,
            last_updated: record.last_updated,
            vector_clock: record.vector_clock.clone(),
        }
    }

    /// Projects the list onto its plain-value wire/persisted form.
    #[must_use]
    pub fn to_record(&self) -> ListRecord {
        ListRecord {
            id: self.id,
            name: self.name.value().clone(),
            created_at: self.created_at,
            last_updated: self.last_updated,
            vector_clock: self.vector_clock.clone(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ListId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.value()
    }

    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    #[must_use]
    pub fn last_updated(&self) -> Timestamp {
        self.last_updated
    }

    #[must_use]
    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }

    /// Renames the list.
    pub fn set_name(&mut self, name: String, writer: &NodeId) {
        self.name.set(name, writer.clone());
        self.touch(writer);
    }

    /// Bumps `last_updated` and the writer's clock component.
    pub fn touch(&mut self, writer: &NodeId) {
        self.last_updated = self.last_updated.advance();
        self.vector_clock.increment(writer);
    }

    /// Replaces the vector clock (adopting a remote write's stamp).
    pub fn set_vector_clock(&mut self, clock: VectorClock) {
        self.vector_clock = clock;
    }

    /// Full per-field merge with a concurrent version of the same list.
    pub fn merge(&mut self, other: &Self) {
        self.name.merge(&other.name);
        self.vector_clock.merge(&other.vector_clock);
        if other.last_updated > self.last_updated {
            self.last_updated = other.last_updated;
        }
        if other.created_at < self.created_at {
            self.created_at = other.created_at;
        }
    }
}
