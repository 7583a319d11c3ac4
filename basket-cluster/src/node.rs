//! The storage node: clock-gated apply logic shared by the HTTP surface
//! and the replication mesh.
//!
//! Every write follows the same state machine. The incoming vector clock
//! (empty if the client sent none) gets the node's component incremented;
//! that stamp is compared against the stored entity's clock:
//!
//! - `Before`: the write is stale, reply with the existing state.
//! - `After` / `Equal`: adopt the incoming clock and values.
//! - `Concurrent`: merge per CRDT rules (counter max, LWW names, clock
//!   union) and keep going.
//!
//! After the local apply the write fans out through the quorum coordinator;
//! replicas that fail land on the hinted-handoff queue. Successful changes
//! are forwarded to the cluster coordinator for SSE fan-out.

use crate::error::{ClusterError, ClusterResult};
use crate::hinted::HintQueue;
use crate::mesh::MeshHandler;
use crate::protocol::{DataType, NodeMessage, NodeReply};
use crate::quorum::QuorumCoordinator;
use async_trait::async_trait;
use basket_crdt::{AworSet, CausalOrder, VectorClock};
use basket_model::{
    ChangeEvent, CreateItemBody, CreateListBody, DeletedList, Item, ItemRecord, List, ListRecord,
    NameBody, QuantityBody, RemovedItem, ToggleBody,
};
use basket_store::LocalStore;
use basket_types::{ItemId, ListId, NodeId, Timestamp};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

/// Default quantity for an item created without one.
const DEFAULT_QUANTITY: i64 = 1;

/// In-memory replica state: the CRDT forms of everything this node holds.
struct NodeData {
    lists: HashMap<ListId, List>,
    items: AworSet<Item>,
}

/// Which fields a concurrent item merge touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeScope {
    Full,
    Quantities,
    NameOnly,
    AcquiredOnly,
}

/// A storage node.
pub struct StorageNode {
    node_id: NodeId,
    store: LocalStore,
    state: Mutex<NodeData>,
    quorum: Option<QuorumCoordinator>,
    hints: Arc<HintQueue>,
    broadcast_tx: Option<mpsc::UnboundedSender<ChangeEvent>>,
}

impl StorageNode {
    /// Builds a node, loading the durable store into memory.
    pub fn new(
        node_id: NodeId,
        store: LocalStore,
        quorum: Option<QuorumCoordinator>,
        hints: Arc<HintQueue>,
        broadcast_tx: Option<mpsc::UnboundedSender<ChangeEvent>>,
    ) -> ClusterResult<Self> {
        let mut lists = HashMap::new();
        for record in store.all_lists()? {
            lists.insert(record.id, List::from_record(&record, &node_id));
        }
        let mut items = AworSet::new();
        for record in store.all_items()? {
            items.add(record.id, Item::from_record(&record, &node_id), &node_id);
        }
        info!(
            node = %node_id,
            lists = lists.len(),
            items = items.len(),
            "storage node loaded"
        );
        Ok(Self {
            node_id,
            store,
            state: Mutex::new(NodeData { lists, items }),
            quorum,
            hints,
            broadcast_tx,
        })
    }

    /// The node's stable identity.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// The hinted-handoff queue (for observability).
    #[must_use]
    pub fn hints(&self) -> &Arc<HintQueue> {
        &self.hints
    }

    /// Stamps an incoming clock with this node's component. This is the
    /// write's logical timestamp.
    fn stamp(&self, provided: Option<VectorClock>) -> VectorClock {
        let mut clock = provided.unwrap_or_default();
        clock.increment(&self.node_id);
        clock
    }

    fn queue_broadcast(&self, event: ChangeEvent) {
        if let Some(tx) = &self.broadcast_tx {
            let _ = tx.send(event);
        }
    }

    /// Quorum fan-out of a locally applied write. Failed replicas are
    /// parked for hinted handoff; a missed W quorum surfaces as 503.
    async fn replicate(&self, key: &str, message: NodeMessage) -> ClusterResult<()> {
        let Some(quorum) = &self.quorum else {
            return Ok(());
        };
        let outcome = quorum.write(key, &message).await;
        for node in &outcome.failed {
            self.hints.push(node.clone(), message.clone());
        }
        if !outcome.quorum_met {
            return Err(ClusterError::QuorumUnavailable(format!(
                "{} of {} write acks for {key}",
                outcome.succeeded.len(),
                quorum.params().w
            )));
        }
        Ok(())
    }

    // ── Lists ────────────────────────────────────────────────────

    /// `POST /api/lists`
    pub async fn create_list(&self, body: CreateListBody) -> ClusterResult<ListRecord> {
        if body.name.trim().is_empty() {
            return Err(ClusterError::BadRequest("list name is required".into()));
        }
        let id = body.id.unwrap_or_default();
        let clock = self.stamp(body.vector_clock);
        let now = Timestamp::now();

        let record = {
            let mut state = self.state.lock().await;
            if state.lists.contains_key(&id) {
                return Err(ClusterError::Conflict(format!("list {id} already exists")));
            }
            let record = ListRecord {
                id,
                name: body.name,
                created_at: body.created_at.unwrap_or(now),
                last_updated: body.last_updated.unwrap_or(now),
                vector_clock: clock,
            };
            self.store.save_list(&record)?;
            state
                .lists
                .insert(id, List::from_record(&record, &self.node_id));
            record
        };

        self.replicate(&id.to_string(), NodeMessage::CreateList {
            list: record.clone(),
        })
        .await?;
        self.queue_broadcast(ChangeEvent::ListCreated(record.clone()));
        Ok(record)
    }

    /// `GET /api/lists`
    pub async fn list_catalog(&self) -> Vec<ListRecord> {
        let state = self.state.lock().await;
        let mut lists: Vec<ListRecord> = state.lists.values().map(List::to_record).collect();
        lists.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));
        lists
    }

    /// `GET /api/items`
    pub async fn item_catalog(&self) -> Vec<ItemRecord> {
        let state = self.state.lock().await;
        let mut items: Vec<ItemRecord> = state.items.iter().map(|(_, i)| i.to_record()).collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        items
    }

    /// Local lookup of a list and its items, as a READ payload.
    fn local_list_payload(&self, id: &ListId) -> Option<serde_json::Value> {
        let list = self.store.get_list(id).ok().flatten()?;
        let items = self.store.items_for_list(id).ok().unwrap_or_default();
        Some(serde_json::json!({ "list": list, "items": items }))
    }

    fn local_item_payload(&self, id: &ItemId) -> Option<serde_json::Value> {
        let item = self.store.get_item(id).ok().flatten()?;
        serde_json::to_value(item).ok()
    }

    /// `GET /api/lists/{id}` — quorum read with local fallback.
    pub async fn get_list_with_items(
        &self,
        id: ListId,
    ) -> ClusterResult<(ListRecord, Vec<ItemRecord>)> {
        let payload = match &self.quorum {
            Some(quorum) => {
                quorum
                    .read(&id.to_string(), DataType::List, || {
                        self.local_list_payload(&id)
                    })
                    .await?
            }
            None => self.local_list_payload(&id),
        };

        let Some(payload) = payload else {
            return Err(ClusterError::NotFound(format!("list {id}")));
        };
        let list: ListRecord = serde_json::from_value(
            payload.get("list").cloned().unwrap_or_default(),
        )?;
        let items: Vec<ItemRecord> = serde_json::from_value(
            payload.get("items").cloned().unwrap_or_default(),
        )
        .unwrap_or_default();
        Ok((list, items))
    }

    /// `DELETE /api/lists/{id}`
    pub async fn delete_list(&self, id: ListId) -> ClusterResult<()> {
        {
            let mut state = self.state.lock().await;
            if state.lists.remove(&id).is_none() && self.store.get_list(&id)?.is_none() {
                return Err(ClusterError::NotFound(format!("list {id}")));
            }
            let doomed: Vec<ItemId> = state
                .items
                .iter()
                .filter(|(_, item)| item.list_id() == id)
                .map(|(item_id, _)| *item_id)
                .collect();
            for item_id in doomed {
                state.items.purge(&item_id);
            }
            self.store.delete_list(&id)?;
        }

        self.replicate(&id.to_string(), NodeMessage::DeleteList { list_id: id })
            .await?;
        self.queue_broadcast(ChangeEvent::ListDeleted(DeletedList { id }));
        Ok(())
    }

    // ── Items ────────────────────────────────────────────────────

    /// Bootstrap-on-miss for a list: quorum-read it and create a local
    /// baseline, so any node can coordinate any key.
    async fn ensure_list(&self, id: ListId) -> ClusterResult<()> {
        if self.state.lock().await.lists.contains_key(&id) {
            return Ok(());
        }
        let Some(quorum) = &self.quorum else {
            return Err(ClusterError::NotFound(format!("list {id}")));
        };
        let payload = quorum
            .read(&id.to_string(), DataType::List, || {
                self.local_list_payload(&id)
            })
            .await?
            .ok_or_else(|| ClusterError::NotFound(format!("list {id}")))?;

        let record: ListRecord =
            serde_json::from_value(payload.get("list").cloned().unwrap_or_default())?;
        let items: Vec<ItemRecord> =
            serde_json::from_value(payload.get("items").cloned().unwrap_or_default())
                .unwrap_or_default();

        debug!(list = %id, items = items.len(), "bootstrapped list from quorum read");
        let mut state = self.state.lock().await;
        self.store.save_list(&record)?;
        state
            .lists
            .insert(record.id, List::from_record(&record, &self.node_id));
        for item in items {
            self.store.save_item(&item)?;
            state
                .items
                .add(item.id, Item::from_record(&item, &self.node_id), &self.node_id);
        }
        Ok(())
    }

    /// Bootstrap-on-miss for an item.
    async fn ensure_item(&self, id: ItemId) -> ClusterResult<()> {
        if self.state.lock().await.items.get(&id).is_some() {
            return Ok(());
        }
        let Some(quorum) = &self.quorum else {
            return Err(ClusterError::NotFound(format!("item {id}")));
        };
        let payload = quorum
            .read(&id.to_string(), DataType::Item, || {
                self.local_item_payload(&id)
            })
            .await?
            .ok_or_else(|| ClusterError::NotFound(format!("item {id}")))?;

        let record: ItemRecord = serde_json::from_value(payload)?;
        debug!(item = %id, "bootstrapped item from quorum read");

        if self.ensure_list(record.list_id).await.is_err() {
            // The item is adoptable even when its list cannot be fetched;
            // the list will arrive through gossip eventually
            warn!(list = %record.list_id, "item bootstrap without its list");
        }

        let mut state = self.state.lock().await;
        self.store.save_item(&record)?;
        state
            .items
            .add(record.id, Item::from_record(&record, &self.node_id), &self.node_id);
        Ok(())
    }

    /// `POST /api/lists/{id}/items`
    pub async fn add_item(
        &self,
        list_id: ListId,
        body: CreateItemBody,
    ) -> ClusterResult<ItemRecord> {
        if body.name.trim().is_empty() {
            return Err(ClusterError::BadRequest("item name is required".into()));
        }
        self.ensure_list(list_id).await?;

        let id = body.id.unwrap_or_default();
        let clock = self.stamp(body.vector_clock);
        let now = Timestamp::now();

        let record = {
            let mut state = self.state.lock().await;
            if state.items.get(&id).is_some() {
                return Err(ClusterError::Conflict(format!("item {id} already exists")));
            }
            let record = ItemRecord {
                id,
                list_id,
                name: body.name,
                quantity: body.quantity.unwrap_or(DEFAULT_QUANTITY),
                acquired: body.acquired.unwrap_or(0),
                created_at: body.created_at.unwrap_or(now),
                last_updated: body.last_updated.unwrap_or(now),
                vector_clock: clock,
            };
            self.store.save_item(&record)?;
            state
                .items
                .add(id, Item::from_record(&record, &self.node_id), &self.node_id);
            record
        };

        self.replicate(&id.to_string(), NodeMessage::AddItem {
            item: record.clone(),
        })
        .await?;
        self.queue_broadcast(ChangeEvent::ItemAdded(record.clone()));
        Ok(record)
    }

    /// `PATCH /api/items/{id}/toggle`
    pub async fn toggle_item(&self, id: ItemId, body: ToggleBody) -> ClusterResult<ItemRecord> {
        self.ensure_item(id).await?;
        let stamped = self.stamp(body.vector_clock);

        let record = {
            let mut state = self.state.lock().await;
            let item = state
                .items
                .get(&id)
                .ok_or_else(|| ClusterError::NotFound(format!("item {id}")))?;

            let target = body
                .acquired
                .unwrap_or_else(|| if item.acquired() >= item.quantity() { 0 } else { item.quantity() });

            match stamped.compare(item.vector_clock()) {
                // Stale write: reply with the existing state, replicate nothing
                CausalOrder::Before => return Ok(item.to_record()),
                CausalOrder::After | CausalOrder::Equal => {
                    let node_id = self.node_id.clone();
                    let updated = body.last_updated;
                    state.items.update_with(&id, |item| {
                        item.apply_acquired(target, &node_id);
                        item.set_vector_clock(stamped);
                        match updated {
                            Some(ts) => item.observe_updated(ts),
                            None => item.observe_updated(Timestamp::now()),
                        }
                    });
                    self.persist_item(&state, &id)?
                }
                CausalOrder::Concurrent => {
                    let node_id = self.node_id.clone();
                    let merged = item.acquired().max(target);
                    let updated = body.last_updated;
                    state.items.update_with(&id, |item| {
                        item.apply_acquired(merged, &node_id);
                        let mut clock = item.vector_clock().clone();
                        clock.merge(&stamped);
                        item.set_vector_clock(clock);
                        if let Some(ts) = updated {
                            item.observe_updated(ts);
                        }
                    });
                    self.persist_item(&state, &id)?
                }
            }
        };

        self.replicate(&id.to_string(), NodeMessage::ToggleCheck {
            item: record.clone(),
        })
        .await?;
        self.queue_broadcast(ChangeEvent::ItemToggled(record.clone()));
        Ok(record)
    }

    /// `PATCH /api/items/{id}/quantity`
    pub async fn update_quantity(
        &self,
        id: ItemId,
        body: QuantityBody,
    ) -> ClusterResult<ItemRecord> {
        if body.quantity < 0 {
            return Err(ClusterError::BadRequest("quantity must be non-negative".into()));
        }
        self.ensure_item(id).await?;
        let stamped = self.stamp(body.vector_clock);

        let record = {
            let mut state = self.state.lock().await;
            let item = state
                .items
                .get(&id)
                .ok_or_else(|| ClusterError::NotFound(format!("item {id}")))?;

            match stamped.compare(item.vector_clock()) {
                CausalOrder::Before => return Ok(item.to_record()),
                CausalOrder::After | CausalOrder::Equal => {
                    let node_id = self.node_id.clone();
                    let acquired = body.acquired;
                    let updated = body.last_updated;
                    let quantity = body.quantity;
                    state.items.update_with(&id, |item| {
                        item.apply_quantity(quantity, &node_id);
                        if let Some(acquired) = acquired {
                            item.apply_acquired(acquired, &node_id);
                        }
                        item.set_vector_clock(stamped);
                        match updated {
                            Some(ts) => item.observe_updated(ts),
                            None => item.observe_updated(Timestamp::now()),
                        }
                    });
                    self.persist_item(&state, &id)?
                }
                CausalOrder::Concurrent => {
                    // Counter rule for concurrent targets: the greater
                    // value wins on both sides of the merge
                    let node_id = self.node_id.clone();
                    let quantity = item.quantity().max(body.quantity);
                    let acquired = body.acquired.map(|a| item.acquired().max(a));
                    let updated = body.last_updated;
                    state.items.update_with(&id, |item| {
                        item.apply_quantity(quantity, &node_id);
                        if let Some(acquired) = acquired {
                            item.apply_acquired(acquired, &node_id);
                        }
                        let mut clock = item.vector_clock().clone();
                        clock.merge(&stamped);
                        item.set_vector_clock(clock);
                        if let Some(ts) = updated {
                            item.observe_updated(ts);
                        }
                    });
                    self.persist_item(&state, &id)?
                }
            }
        };

        self.replicate(&id.to_string(), NodeMessage::UpdateQuantity {
            item: record.clone(),
        })
        .await?;
        self.queue_broadcast(ChangeEvent::ItemQuantityUpdated(record.clone()));
        Ok(record)
    }

    /// `PATCH /api/items/{id}/name`
    pub async fn update_name(&self, id: ItemId, body: NameBody) -> ClusterResult<ItemRecord> {
        if body.name.trim().is_empty() {
            return Err(ClusterError::BadRequest("item name is required".into()));
        }
        self.ensure_item(id).await?;
        let stamped = self.stamp(body.vector_clock);

        let record = {
            let mut state = self.state.lock().await;
            let item = state
                .items
                .get(&id)
                .ok_or_else(|| ClusterError::NotFound(format!("item {id}")))?;

            let write_ts = body.last_updated.unwrap_or_else(Timestamp::now);
            match stamped.compare(item.vector_clock()) {
                CausalOrder::Before => return Ok(item.to_record()),
                CausalOrder::After | CausalOrder::Equal => {
                    let node_id = self.node_id.clone();
                    let name = body.name;
                    state.items.update_with(&id, |item| {
                        item.apply_name(name, write_ts, &node_id);
                        item.set_vector_clock(stamped);
                        item.observe_updated(write_ts);
                    });
                    self.persist_item(&state, &id)?
                }
                CausalOrder::Concurrent => {
                    let node_id = self.node_id.clone();
                    let name = body.name;
                    state.items.update_with(&id, |item| {
                        // LWW by timestamp decides whether the write lands
                        item.apply_name(name, write_ts, &node_id);
                        let mut clock = item.vector_clock().clone();
                        clock.merge(&stamped);
                        item.set_vector_clock(clock);
                        item.observe_updated(write_ts);
                    });
                    self.persist_item(&state, &id)?
                }
            }
        };

        self.replicate(&id.to_string(), NodeMessage::UpdateName {
            item: record.clone(),
        })
        .await?;
        self.queue_broadcast(ChangeEvent::ItemNameUpdated(record.clone()));
        Ok(record)
    }

    /// `DELETE /api/items/{id}`
    pub async fn remove_item(&self, id: ItemId) -> ClusterResult<()> {
        let list_id = {
            let mut state = self.state.lock().await;
            let known_memory = state.items.element(&id).map(Item::list_id);
            let known_store = self.store.get_item(&id)?.map(|r| r.list_id);
            let Some(list_id) = known_memory.or(known_store) else {
                return Err(ClusterError::NotFound(format!("item {id}")));
            };
            state.items.remove(&id);
            self.store.delete_item(&id)?;
            list_id
        };

        self.replicate(&id.to_string(), NodeMessage::RemoveItem { item_id: id })
            .await?;
        self.queue_broadcast(ChangeEvent::ItemRemoved(RemovedItem { id, list_id }));
        Ok(())
    }

    /// Persists the current in-memory version of an item, returning its
    /// record.
    fn persist_item(&self, state: &NodeData, id: &ItemId) -> ClusterResult<ItemRecord> {
        let record = state
            .items
            .element(id)
            .map(Item::to_record)
            .ok_or_else(|| ClusterError::NotFound(format!("item {id}")))?;
        self.store.save_item(&record)?;
        Ok(record)
    }

    // ── Gossip (replication mesh) ────────────────────────────────

    /// Applies an incoming replication message through the same clock-aware
    /// logic as client writes.
    pub async fn apply_gossip(&self, message: NodeMessage) -> ClusterResult<NodeReply> {
        match message {
            NodeMessage::Read { key, data_type } => {
                let payload = match data_type {
                    DataType::List => ListId::parse(&key)
                        .ok()
                        .and_then(|id| self.local_list_payload(&id)),
                    DataType::Item => ItemId::parse(&key)
                        .ok()
                        .and_then(|id| self.local_item_payload(&id)),
                };
                Ok(NodeReply::ok_with(payload.unwrap_or(serde_json::Value::Null)))
            }
            NodeMessage::CreateList { list } => {
                self.gossip_list(list).await?;
                Ok(NodeReply::ok())
            }
            NodeMessage::DeleteList { list_id } => {
                let mut state = self.state.lock().await;
                state.lists.remove(&list_id);
                let doomed: Vec<ItemId> = state
                    .items
                    .iter()
                    .filter(|(_, item)| item.list_id() == list_id)
                    .map(|(id, _)| *id)
                    .collect();
                for id in doomed {
                    state.items.purge(&id);
                }
                self.store.delete_list(&list_id)?;
                Ok(NodeReply::ok())
            }
            NodeMessage::AddItem { item } => {
                self.gossip_item(item, MergeScope::Full, true).await?;
                Ok(NodeReply::ok())
            }
            NodeMessage::UpdateItem { item } => {
                self.gossip_item(item, MergeScope::Full, false).await?;
                Ok(NodeReply::ok())
            }
            NodeMessage::UpdateQuantity { item } => {
                self.gossip_item(item, MergeScope::Quantities, false).await?;
                Ok(NodeReply::ok())
            }
            NodeMessage::UpdateName { item } => {
                self.gossip_item(item, MergeScope::NameOnly, false).await?;
                Ok(NodeReply::ok())
            }
            NodeMessage::ToggleCheck { item } => {
                self.gossip_item(item, MergeScope::AcquiredOnly, false).await?;
                Ok(NodeReply::ok())
            }
            NodeMessage::RemoveItem { item_id } => {
                let mut state = self.state.lock().await;
                state.items.remove(&item_id);
                self.store.delete_item(&item_id)?;
                Ok(NodeReply::ok())
            }
            NodeMessage::Broadcast { .. } => Ok(NodeReply::error(
                "storage nodes do not accept BROADCAST",
            )),
        }
    }

    /// Clock-gated apply of a replicated list record.
    async fn gossip_list(&self, record: ListRecord) -> ClusterResult<()> {
        let mut state = self.state.lock().await;
        match state.lists.get_mut(&record.id) {
            None => {
                self.store.save_list(&record)?;
                state
                    .lists
                    .insert(record.id, List::from_record(&record, &self.node_id));
            }
            Some(local) => match record.vector_clock.compare(local.vector_clock()) {
                CausalOrder::Before => {}
                CausalOrder::After | CausalOrder::Equal => {
                    *local = List::from_record(&record, &self.node_id);
                    self.store.save_list(&record)?;
                }
                CausalOrder::Concurrent => {
                    local.merge(&List::from_record(&record, &self.node_id));
                    self.store.save_list(&local.to_record())?;
                }
            },
        }
        Ok(())
    }

    /// Clock-gated apply of a replicated item record.
    async fn gossip_item(
        &self,
        record: ItemRecord,
        scope: MergeScope,
        rebirth: bool,
    ) -> ClusterResult<()> {
        let mut state = self.state.lock().await;

        let known = state.items.element(&record.id).is_some();
        if !known {
            // An item for a list this node no longer (or never) holds is a
            // no-op: a replayed ADD_ITEM must not resurrect a deleted list
            if !state.lists.contains_key(&record.list_id) {
                debug!(item = %record.id, list = %record.list_id, "dropping item gossip for unknown list");
                return Ok(());
            }
            // Unknown item: the record is the baseline
            self.store.save_item(&record)?;
            state.items.add(
                record.id,
                Item::from_record(&record, &self.node_id),
                &self.node_id,
            );
            return Ok(());
        }

        let suppressed = state
            .items
            .pending_removals()
            .any(|pending| *pending == record.id);
        if suppressed && !rebirth {
            // Updates lose to a local remove; only a fresh add re-births
            return Ok(());
        }

        if rebirth {
            // A replicated ADD for a known id re-births it before merging,
            // so a concurrent local remove cannot shadow the add
            let baseline = state
                .items
                .element(&record.id)
                .cloned()
                .unwrap_or_else(|| Item::from_record(&record, &self.node_id));
            state.items.add(record.id, baseline, &self.node_id);
        }

        let Some(local) = state.items.element(&record.id) else {
            return Ok(());
        };

        match record.vector_clock.compare(local.vector_clock()) {
            CausalOrder::Before => {}
            CausalOrder::After | CausalOrder::Equal => {
                let node_id = self.node_id.clone();
                let incoming = Item::from_record(&record, &node_id);
                state.items.update_with(&record.id, |item| {
                    *item = incoming;
                });
                self.persist_item(&state, &record.id)?;
            }
            CausalOrder::Concurrent => {
                let node_id = self.node_id.clone();
                let quantity = local.quantity().max(record.quantity);
                let acquired = local.acquired().max(record.acquired);
                let incoming_clock = record.vector_clock.clone();
                let name = record.name.clone();
                let name_ts = record.last_updated;
                state.items.update_with(&record.id, |item| {
                    match scope {
                        MergeScope::Full => {
                            item.apply_name(name, name_ts, &node_id);
                            item.apply_quantity(quantity, &node_id);
                            item.apply_acquired(acquired, &node_id);
                        }
                        MergeScope::Quantities => {
                            item.apply_quantity(quantity, &node_id);
                            item.apply_acquired(acquired, &node_id);
                        }
                        MergeScope::NameOnly => {
                            item.apply_name(name, name_ts, &node_id);
                        }
                        MergeScope::AcquiredOnly => {
                            item.apply_acquired(acquired, &node_id);
                        }
                    }
                    let mut clock = item.vector_clock().clone();
                    clock.merge(&incoming_clock);
                    item.set_vector_clock(clock);
                    item.observe_updated(name_ts);
                });
                self.persist_item(&state, &record.id)?;
            }
        }

        if rebirth {
            // A re-birth must land in the store even when the clock gate
            // had nothing to change
            self.persist_item(&state, &record.id)?;
        }
        Ok(())
    }
}

#[async_trait]
impl MeshHandler for StorageNode {
    async fn handle(&self, message: NodeMessage) -> NodeReply {
        match self.apply_gossip(message).await {
            Ok(reply) => reply,
            Err(e) => NodeReply::error(e.to_string()),
        }
    }
}
