//! The item aggregate.

use crate::wire::ItemRecord;
use basket_crdt::{FieldMerge, LwwRegister, PnCounter, VectorClock};
use basket_types::{ItemId, ListId, NodeId, Timestamp};
use serde::{Deserialize, Serialize};

/// A shopping-list item.
///
/// `id`, `list_id`, and `created_at` are immutable after creation. The
/// mutable attributes are CRDTs: `name` resolves by last-writer-wins,
/// `quantity` and `acquired` are PN counters so concurrent edits commute.
/// The vector clock summarizes the causal history of the whole item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    list_id: ListId,
    name: LwwRegister<String>,
    quantity: PnCounter,
    acquired: PnCounter,
    created_at: Timestamp,
    last_updated: Timestamp,
    vector_clock: VectorClock,
}

impl Item {
    /// Creates a new item written by `writer`, stamping the writer's clock
    /// component.
    #[must_use]
    pub fn new(id: ItemId, list_id: ListId, name: String, quantity: i64, writer: &NodeId) -> Self {
        let now = Timestamp::now();
        let mut vector_clock = VectorClock::new();
        vector_clock.increment(writer);
        Self {
            id,
            list_id,
            name: LwwRegister::with_timestamp(name, now, writer.clone()),
            quantity: PnCounter::with_initial(writer, quantity),
            acquired: PnCounter::new(),
            created_at: now,
            last_updated: now,
            vector_clock,
        }
    }

    /// Rebuilds an item from its plain-value record.
    ///
    /// The CRDT tallies are seeded under `seed` — provenance of the visible
    /// values is flattened, which is exactly what the persisted layout
    /// stores. The record's vector clock is kept as-is.
    #[must_use]
    pub fn from_record(record: &ItemRecord, seed: &NodeId) -> Self {
        Self {
            id: record.id,
            list_id: record.list_id,
            name: LwwRegister::with_timestamp(
                record.name.clone(),
                record.last_updated,
                seed.clone(),
            ),
            quantity: PnCounter::with_initial(seed, record.quantity),
            acquired: PnCounter::with_initial(seed, record.acquired),
            created_at: record.created_at,
            last_updated: record.last_updated,
            vector_clock: record.vector_clock.clone(),
        }
    }

    /// Projects the item onto its plain-value wire/persisted form.
    #[must_use]
    pub fn to_record(&self) -> ItemRecord {
        ItemRecord {
            id: self.id,
            list_id: self.list_id,
            name: self.name.value().clone(),
            quantity: self.quantity.value(),
            acquired: self.acquired.value(),
            created_at: self.created_at,
            last_updated: self.last_updated,
            vector_clock: self.vector_clock.clone(),
        }
    }

    // ── Accessors ────────────────────────────────────────────────

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn list_id(&self) -> ListId {
        self.list_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.value()
    }

    #[must_use]
    pub fn quantity(&self) -> i64 {
        self.quantity.value()
    }

    #[must_use]
    pub fn acquired(&self) -> i64 {
        self.acquired.value()
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

    // ── Mutations ────────────────────────────────────────────────

    /// Renames the item.
    pub fn set_name(&mut self, name: String, writer: &NodeId) {
        self.name.set(name, writer.clone());
        self.touch(writer);
    }

    /// Renames with an explicit timestamp (replay of a remote write).
    pub fn set_name_at(&mut self, name: String, timestamp: Timestamp, writer: &NodeId) {
        self.apply_name(name, timestamp, writer);
        self.touch(writer);
    }

    /// Moves `quantity` to a target value via a counter delta.
    pub fn set_quantity_target(&mut self, target: i64, writer: &NodeId) {
        self.apply_quantity(target, writer);
        self.touch(writer);
    }

    /// Moves `acquired` to a target value via a counter delta.
    pub fn set_acquired_target(&mut self, target: i64, writer: &NodeId) {
        self.apply_acquired(target, writer);
        self.touch(writer);
    }

    /// Applies a quantity target without stamping clocks; the caller owns
    /// the causality bookkeeping.
    pub fn apply_quantity(&mut self, target: i64, writer: &NodeId) {
        self.quantity.set_target(writer, target);
    }

    /// Applies an acquired target without stamping clocks.
    pub fn apply_acquired(&mut self, target: i64, writer: &NodeId) {
        self.acquired.set_target(writer, target);
    }

    /// Applies a name write through the register's LWW rule without
    /// stamping clocks. Returns true if the write won.
    pub fn apply_name(&mut self, name: String, timestamp: Timestamp, writer: &NodeId) -> bool {
        self.name.set_with_timestamp(name, timestamp, writer.clone())
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

    /// Raises `last_updated` to at least `timestamp`.
    pub fn observe_updated(&mut self, timestamp: Timestamp) {
        if timestamp > self.last_updated {
            self.last_updated = timestamp;
        }
    }

    /// Merges only the `acquired` counter and the clock from another
    /// version. This is the toggle-specific merge: a concurrent check-off
    /// must not disturb the quantity.
    pub fn merge_acquired(&mut self, other: &Self) {
        self.acquired.merge(&other.acquired);
        self.vector_clock.merge(&other.vector_clock);
        self.observe_updated(other.last_updated);
    }

    /// Merges both counters and the clock from another version.
    pub fn merge_quantities(&mut self, other: &Self) {
        self.quantity.merge(&other.quantity);
        self.acquired.merge(&other.acquired);
        self.vector_clock.merge(&other.vector_clock);
        self.observe_updated(other.last_updated);
    }

    /// Merges only the name register and the clock from another version.
    pub fn merge_name(&mut self, other: &Self) {
        self.name.merge(&other.name);
        self.vector_clock.merge(&other.vector_clock);
        self.observe_updated(other.last_updated);
    }
}

impl FieldMerge for Item {
    /// Full per-field merge of two concurrent versions of the same item:
    /// LWW on the name, per-node max on both counters, component max on the
    /// clock, max of `last_updated`, min of `created_at`.
    fn merge_fields(&mut self, other: &Self) {
        self.name.merge(&other.name);
        self.quantity.merge(&other.quantity);
        self.acquired.merge(&other.acquired);
        self.vector_clock.merge(&other.vector_clock);
        self.observe_updated(other.last_updated);
        if other.created_at < self.created_at {
            self.created_at = other.created_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str) -> NodeId {
        NodeId::new(name)
    }

    fn item(writer: &NodeId) -> Item {
        Item::new(ItemId::new(), ListId::new(), "Milk".into(), 3, writer)
    }

    #[test]
    fn new_item_stamps_writer_clock() {
        let writer = node("client-x");
        let item = item(&writer);
        assert_eq!(item.vector_clock().get(&writer), 1);
        assert_eq!(item.quantity(), 3);
        assert_eq!(item.acquired(), 0);
    }

    #[test]
    fn set_quantity_target_applies_delta() {
        let writer = node("client-x");
        let mut item = item(&writer);
        item.set_quantity_target(5, &writer);
        assert_eq!(item.quantity(), 5);
        assert_eq!(item.vector_clock().get(&writer), 2);
    }

    #[test]
    fn toggle_merge_leaves_quantity_untouched() {
        let writer_x = node("x");
        let writer_y = node("y");
        let mut a = item(&writer_x);
        let mut b = a.clone();

        a.set_quantity_target(10, &writer_x);
        b.set_acquired_target(3, &writer_y);

        a.merge_acquired(&b);
        assert_eq!(a.quantity(), 10, "toggle merge must not touch quantity");
        assert_eq!(a.acquired(), 3);
        assert_eq!(a.vector_clock().get(&writer_x), 2);
        assert_eq!(a.vector_clock().get(&writer_y), 1);
    }

    #[test]
    fn record_roundtrip_preserves_visible_state() {
        let writer = node("client-x");
        let mut item = item(&writer);
        item.set_acquired_target(2, &writer);

        let record = item.to_record();
        let rebuilt = Item::from_record(&record, &node("node-4001"));

        assert_eq!(rebuilt.id(), item.id());
        assert_eq!(rebuilt.name(), item.name());
        assert_eq!(rebuilt.quantity(), item.quantity());
        assert_eq!(rebuilt.acquired(), item.acquired());
        assert_eq!(rebuilt.vector_clock(), item.vector_clock());
    }

    #[test]
    fn field_merge_converges() {
        let x = node("x");
        let y = node("y");
        let mut a = item(&x);
        let mut b = a.clone();

        a.set_name("Oat Milk".into(), &x);
        b.set_quantity_target(7, &y);

        let mut ab = a.clone();
        ab.merge_fields(&b);
        let mut ba = b.clone();
        ba.merge_fields(&a);

        assert_eq!(ab.name(), ba.name());
        assert_eq!(ab.quantity(), ba.quantity());
        assert_eq!(ab.vector_clock(), ba.vector_clock());
    }
}
