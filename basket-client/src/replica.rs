//! The client's local replica: in-memory CRDT state over the durable store.
//!
//! All reads and local-first mutations go through here. Server-originated
//! changes (SSE events, first-sync pulls) are merged in with the same
//! three-case vector clock logic the storage nodes use: a causally earlier
//! version is ignored, a later or equal one is adopted, and a concurrent
//! one is merged field by field with a scope that depends on the event.

use crate::error::{ClientError, ClientResult};
use basket_crdt::{AworSet, CausalOrder};
use basket_model::{Item, ItemRecord, List, ListRecord};
use basket_store::{LocalStore, META_NODE_ID};
use basket_types::{ItemId, ListId, NodeId};
use std::collections::HashMap;
use tracing::debug;

/// Which fields a concurrent remote item merge touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteScope {
    /// `item-updated`, `item-added`: everything.
    Full,
    /// `item-quantity-updated`: both counters.
    Quantities,
    /// `item-name-updated`: the name register.
    NameOnly,
    /// `item-toggled`: only `acquired`.
    AcquiredOnly,
}

/// The client's local copy of every list it knows.
pub struct LocalReplica {
    node_id: NodeId,
    store: LocalStore,
    lists: HashMap<ListId, List>,
    items: AworSet<Item>,
}

impl LocalReplica {
    /// Opens the replica over a store, loading persisted state and the
    /// client's stable identity (generated and persisted on first run).
    pub fn open(store: LocalStore) -> ClientResult<Self> {
        let node_id = match store.get_meta(META_NODE_ID)? {
            Some(existing) => NodeId::new(existing),
            None => {
                let fresh = NodeId::random();
                store.set_meta(META_NODE_ID, fresh.as_str())?;
                fresh
            }
        };

        let mut lists = HashMap::new();
        for record in store.all_lists()? {
            lists.insert(record.id, List::from_record(&record, &node_id));
        }
        let mut items = AworSet::new();
        for record in store.all_items()? {
            items.add(record.id, Item::from_record(&record, &node_id), &node_id);
        }

        Ok(Self {
            node_id,
            store,
            lists,
            items,
        })
    }

    /// The client's stable identity.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    // ── Reads ────────────────────────────────────────────────────

    /// True if this client has the list locally (the privacy boundary for
    /// server-pushed events).
    #[must_use]
    pub fn knows_list(&self, id: &ListId) -> bool {
        self.lists.contains_key(id)
    }

    /// All known lists, most recently updated first.
    #[must_use]
    pub fn lists(&self) -> Vec<ListRecord> {
        let mut lists: Vec<ListRecord> = self.lists.values().map(List::to_record).collect();
        lists.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        lists
    }

    /// One list.
    #[must_use]
    pub fn list(&self, id: &ListId) -> Option<ListRecord> {
        self.lists.get(id).map(List::to_record)
    }

    /// The visible items of a list, oldest first.
    #[must_use]
    pub fn items_for(&self, list_id: &ListId) -> Vec<ItemRecord> {
        let mut items: Vec<ItemRecord> = self
            .items
            .iter()
            .filter(|(_, item)| item.list_id() == *list_id)
            .map(|(_, item)| item.to_record())
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    /// One item.
    #[must_use]
    pub fn item(&self, id: &ItemId) -> Option<ItemRecord> {
        self.items.get(id).map(Item::to_record)
    }

    // ── Local-first mutations ────────────────────────────────────

    /// Creates a list locally.
    pub fn create_list(&mut self, name: impl Into<String>) -> ClientResult<ListRecord> {
        let list = List::new(ListId::new(), name.into(), &self.node_id);
        let record = list.to_record();
        self.store.save_list(&record)?;
        self.lists.insert(record.id, list);
        Ok(record)
    }

    /// Deletes a list and its items locally.
    pub fn delete_list(&mut self, id: &ListId) -> ClientResult<ListRecord> {
        let Some(list) = self.lists.remove(id) else {
            return Err(ClientError::NotFound(format!("list {id}")));
        };
        let doomed: Vec<ItemId> = self
            .items
            .iter()
            .filter(|(_, item)| item.list_id() == *id)
            .map(|(item_id, _)| *item_id)
            .collect();
        for item_id in doomed {
            self.items.purge(&item_id);
        }
        self.store.delete_list(id)?;
        Ok(list.to_record())
    }

    /// Adds an item to a known list.
    pub fn add_item(
        &mut self,
        list_id: &ListId,
        name: impl Into<String>,
        quantity: i64,
    ) -> ClientResult<ItemRecord> {
        if !self.lists.contains_key(list_id) {
            return Err(ClientError::NotFound(format!("list {list_id}")));
        }
        let item = Item::new(ItemId::new(), *list_id, name.into(), quantity, &self.node_id);
        let record = item.to_record();
        self.store.save_item(&record)?;
        self.items.add(record.id, item, &self.node_id);
        Ok(record)
    }

    /// Renames an item.
    pub fn update_name(&mut self, id: &ItemId, name: impl Into<String>) -> ClientResult<ItemRecord> {
        let node_id = self.node_id.clone();
        let name = name.into();
        if !self.items.update_with(id, |item| item.set_name(name, &node_id)) {
            return Err(ClientError::NotFound(format!("item {id}")));
        }
        self.persist_item(id)
    }

    /// Moves an item's quantity to a target value.
    pub fn update_quantity(&mut self, id: &ItemId, quantity: i64) -> ClientResult<ItemRecord> {
        let node_id = self.node_id.clone();
        if !self
            .items
            .update_with(id, |item| item.set_quantity_target(quantity, &node_id))
        {
            return Err(ClientError::NotFound(format!("item {id}")));
        }
        self.persist_item(id)
    }

    /// Toggles (or explicitly sets) an item's acquired count.
    pub fn toggle(&mut self, id: &ItemId, acquired: Option<i64>) -> ClientResult<ItemRecord> {
        let target = match acquired {
            Some(target) => target,
            None => {
                let item = self
                    .items
                    .get(id)
                    .ok_or_else(|| ClientError::NotFound(format!("item {id}")))?;
                if item.acquired() >= item.quantity() {
                    0
                } else {
                    item.quantity()
                }
            }
        };
        let node_id = self.node_id.clone();
        if !self
            .items
            .update_with(id, |item| item.set_acquired_target(target, &node_id))
        {
            return Err(ClientError::NotFound(format!("item {id}")));
        }
        self.persist_item(id)
    }

    /// Removes an item locally.
    pub fn remove_item(&mut self, id: &ItemId) -> ClientResult<ItemRecord> {
        let record = self
            .items
            .element(id)
            .map(Item::to_record)
            .ok_or_else(|| ClientError::NotFound(format!("item {id}")))?;
        self.items.remove(id);
        self.store.delete_item(id)?;
        Ok(record)
    }

    fn persist_item(&self, id: &ItemId) -> ClientResult<ItemRecord> {
        let record = self
            .items
            .element(id)
            .map(Item::to_record)
            .ok_or_else(|| ClientError::NotFound(format!("item {id}")))?;
        self.store.save_item(&record)?;
        Ok(record)
    }

    // ── Server-originated merges ─────────────────────────────────

    /// Merges a server copy of a list into local state.
    pub fn apply_remote_list(&mut self, record: &ListRecord) -> ClientResult<()> {
        match self.lists.get_mut(&record.id) {
            None => {
                self.store.save_list(record)?;
                self.lists
                    .insert(record.id, List::from_record(record, &self.node_id));
            }
            Some(local) => match record.vector_clock.compare(local.vector_clock()) {
                CausalOrder::Before => {}
                CausalOrder::After | CausalOrder::Equal => {
                    *local = List::from_record(record, &self.node_id);
                    self.store.save_list(record)?;
                }
                CausalOrder::Concurrent => {
                    local.merge(&List::from_record(record, &self.node_id));
                    self.store.save_list(&local.to_record())?;
                }
            },
        }
        Ok(())
    }

    /// Applies a server-side list deletion.
    pub fn apply_remote_list_deleted(&mut self, id: &ListId) -> ClientResult<()> {
        if self.lists.remove(id).is_none() {
            return Ok(());
        }
        let doomed: Vec<ItemId> = self
            .items
            .iter()
            .filter(|(_, item)| item.list_id() == *id)
            .map(|(item_id, _)| *item_id)
            .collect();
        for item_id in doomed {
            self.items.purge(&item_id);
        }
        self.store.delete_list(id)?;
        Ok(())
    }

    /// Merges a server copy of an item into local state.
    ///
    /// `rebirth` is true for `item-added` events: a fresh server add wins
    /// over a not-yet-synced local removal.
    pub fn apply_remote_item(
        &mut self,
        record: &ItemRecord,
        scope: RemoteScope,
        rebirth: bool,
    ) -> ClientResult<()> {
        if !self.lists.contains_key(&record.list_id) {
            debug!(item = %record.id, "ignoring item event for unknown list");
            return Ok(());
        }

        if self.items.element(&record.id).is_none() {
            self.store.save_item(record)?;
            self.items.add(
                record.id,
                Item::from_record(record, &self.node_id),
                &self.node_id,
            );
            return Ok(());
        }

        let suppressed = self
            .items
            .pending_removals()
            .any(|pending| *pending == record.id);
        if suppressed && !rebirth {
            // Updates lose to the local remove; only a fresh add re-births
            return Ok(());
        }
        if rebirth && suppressed {
            let baseline = Item::from_record(record, &self.node_id);
            self.items.add(record.id, baseline, &self.node_id);
            self.persist_item(&record.id)?;
            return Ok(());
        }

        let Some(local) = self.items.element(&record.id) else {
            return Ok(());
        };

        match record.vector_clock.compare(local.vector_clock()) {
            CausalOrder::Before => {}
            CausalOrder::After | CausalOrder::Equal => {
                let incoming = Item::from_record(record, &self.node_id);
                self.items.update_with(&record.id, |item| *item = incoming);
                self.persist_item(&record.id)?;
            }
            CausalOrder::Concurrent => {
                let node_id = self.node_id.clone();
                let quantity = local.quantity().max(record.quantity);
                let acquired = local.acquired().max(record.acquired);
                let incoming_clock = record.vector_clock.clone();
                let name = record.name.clone();
                let name_ts = record.last_updated;
                self.items.update_with(&record.id, |item| {
                    match scope {
                        RemoteScope::Full => {
                            item.apply_name(name, name_ts, &node_id);
                            item.apply_quantity(quantity, &node_id);
                            item.apply_acquired(acquired, &node_id);
                        }
                        RemoteScope::Quantities => {
                            item.apply_quantity(quantity, &node_id);
                            item.apply_acquired(acquired, &node_id);
                        }
                        RemoteScope::NameOnly => {
                            item.apply_name(name, name_ts, &node_id);
                        }
                        RemoteScope::AcquiredOnly => {
                            item.apply_acquired(acquired, &node_id);
                        }
                    }
                    let mut clock = item.vector_clock().clone();
                    clock.merge(&incoming_clock);
                    item.set_vector_clock(clock);
                    item.observe_updated(name_ts);
                });
                self.persist_item(&record.id)?;
            }
        }
        Ok(())
    }

    /// Applies a server-side item removal.
    pub fn apply_remote_item_removed(&mut self, id: &ItemId) -> ClientResult<()> {
        if self.items.element(id).is_some() {
            self.items.remove(id);
            self.store.delete_item(id)?;
        }
        Ok(())
    }
}
