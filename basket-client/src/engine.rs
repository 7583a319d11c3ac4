//! The sync engine: local-first mutations, the durable pending-op queue,
//! and the push/pull loop against the cluster.
//!
//! Every mutation commits locally and appends a pending operation before
//! any network traffic. One sync pass runs at a time; a failed pass leaves
//! the queue intact and schedules an exponential-backoff retry. The first
//! pass of a session additionally pushes all local lists up (409 means the
//! server already has them) and pulls each known list back for a CRDT
//! merge.

use crate::error::{ClientError, ClientResult};
use crate::events::{spawn_event_consumer, DEFAULT_RECONNECT_DELAY, DEFAULT_SSE_PROBE};
use crate::pool::{ServerPool, DEFAULT_HEALTH_POLL};
use crate::replica::{LocalReplica, RemoteScope};
use basket_model::{ChangeEvent, ItemRecord, ListRecord, OpKind, PendingOp};
use basket_store::{LocalStore, META_LAST_SYNC};
use basket_types::{ItemId, ListId, Timestamp};
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// What the sync badge shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Queue drained, cluster reachable.
    Synced,
    /// A sync pass is running.
    Syncing,
    /// Operations are waiting (count), cluster unreachable or mid-drain.
    Queued(usize),
}

/// Tunables for the sync loop.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Schedule a background sync after every local mutation.
    pub auto_sync: bool,
    /// First retry delay after a failed pass.
    pub backoff_base: Duration,
    /// Multiplier between consecutive retries.
    pub backoff_factor: u32,
    /// Retries before giving up until the next mutation or manual sync.
    pub max_sync_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auto_sync: true,
            backoff_base: Duration::from_millis(500),
            backoff_factor: 2,
            max_sync_attempts: 5,
        }
    }
}

/// The client sync engine.
pub struct SyncEngine {
    replica: Mutex<LocalReplica>,
    store: LocalStore,
    pool: Arc<ServerPool>,
    http: reqwest::Client,
    config: ClientConfig,
    sync_guard: Mutex<()>,
    status: std::sync::Mutex<SyncStatus>,
    attempts: AtomicU32,
    first_sync_done: AtomicBool,
}

impl SyncEngine {
    /// Builds the engine over a store and a server pool.
    pub fn new(
        store: LocalStore,
        pool: Arc<ServerPool>,
        config: ClientConfig,
    ) -> ClientResult<Arc<Self>> {
        let replica = LocalReplica::open(store.clone())?;
        info!(node = %replica.node_id(), "client engine ready");
        Ok(Arc::new(Self {
            replica: Mutex::new(replica),
            store,
            pool,
            http: reqwest::Client::new(),
            config,
            sync_guard: Mutex::new(()),
            status: std::sync::Mutex::new(SyncStatus::Synced),
            attempts: AtomicU32::new(0),
            first_sync_done: AtomicBool::new(false),
        }))
    }

    /// The server pool in use.
    #[must_use]
    pub fn pool(&self) -> &Arc<ServerPool> {
        &self.pool
    }

    /// Spawns the background tasks of a running client: an initial sync,
    /// the server-pool health poller, and the coordinator event consumer.
    /// The returned handles are aborted by the caller on shutdown.
    pub fn start(self: &Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let engine = Arc::clone(self);
        let initial = tokio::spawn(async move {
            let _ = engine.sync_now().await;
        });
        vec![
            initial,
            self.pool.spawn_health_task(DEFAULT_HEALTH_POLL),
            spawn_event_consumer(Arc::clone(self), DEFAULT_SSE_PROBE, DEFAULT_RECONNECT_DELAY),
        ]
    }

    /// The current sync badge.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        *self.status.lock().unwrap()
    }

    fn set_status(&self, status: SyncStatus) {
        *self.status.lock().unwrap() = status;
    }

    /// Unacknowledged operations in the queue.
    pub fn pending_count(&self) -> usize {
        self.store.pending_count().unwrap_or(0)
    }

    /// When the last successful sync pass finished, if any.
    pub fn last_synced_at(&self) -> Option<Timestamp> {
        self.store
            .get_meta(META_LAST_SYNC)
            .ok()
            .flatten()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(Timestamp::from_millis)
    }

    // ── Reads ────────────────────────────────────────────────────

    pub async fn lists(&self) -> Vec<ListRecord> {
        self.replica.lock().await.lists()
    }

    pub async fn items_for(&self, list_id: &ListId) -> Vec<ItemRecord> {
        self.replica.lock().await.items_for(list_id)
    }

    pub async fn item(&self, id: &ItemId) -> Option<ItemRecord> {
        self.replica.lock().await.item(id)
    }

    pub async fn list(&self, id: &ListId) -> Option<ListRecord> {
        self.replica.lock().await.list(id)
    }

    // ── Local-first mutations ────────────────────────────────────

    /// Creates a list locally and queues the CREATE_LIST push.
    pub async fn create_list(self: &Arc<Self>, name: impl Into<String>) -> ClientResult<ListRecord> {
        let record = self.replica.lock().await.create_list(name)?;
        self.enqueue(OpKind::CreateList, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(record)
    }

    /// Deletes a list locally and queues the DELETE_LIST push.
    pub async fn delete_list(self: &Arc<Self>, id: &ListId) -> ClientResult<()> {
        let record = self.replica.lock().await.delete_list(id)?;
        self.enqueue(OpKind::DeleteList, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(())
    }

    /// Adds an item locally and queues the ADD_ITEM push.
    pub async fn add_item(
        self: &Arc<Self>,
        list_id: &ListId,
        name: impl Into<String>,
        quantity: i64,
    ) -> ClientResult<ItemRecord> {
        let record = self.replica.lock().await.add_item(list_id, name, quantity)?;
        self.enqueue(OpKind::AddItem, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(record)
    }

    /// Renames an item locally and queues the UPDATE_NAME push.
    pub async fn update_name(
        self: &Arc<Self>,
        id: &ItemId,
        name: impl Into<String>,
    ) -> ClientResult<ItemRecord> {
        let record = self.replica.lock().await.update_name(id, name)?;
        self.enqueue(OpKind::UpdateName, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(record)
    }

    /// Changes an item's quantity locally and queues the UPDATE_QUANTITY
    /// push.
    pub async fn update_quantity(
        self: &Arc<Self>,
        id: &ItemId,
        quantity: i64,
    ) -> ClientResult<ItemRecord> {
        let record = self.replica.lock().await.update_quantity(id, quantity)?;
        self.enqueue(OpKind::UpdateQuantity, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(record)
    }

    /// Toggles an item locally and queues the TOGGLE_CHECK push.
    pub async fn toggle(
        self: &Arc<Self>,
        id: &ItemId,
        acquired: Option<i64>,
    ) -> ClientResult<ItemRecord> {
        let record = self.replica.lock().await.toggle(id, acquired)?;
        self.enqueue(OpKind::ToggleCheck, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(record)
    }

    /// Removes an item locally and queues the REMOVE_ITEM push.
    pub async fn remove_item(self: &Arc<Self>, id: &ItemId) -> ClientResult<()> {
        let record = self.replica.lock().await.remove_item(id)?;
        self.enqueue(OpKind::RemoveItem, serde_json::to_value(&record)?)?;
        self.schedule_sync();
        Ok(())
    }

    fn enqueue(&self, kind: OpKind, data: serde_json::Value) -> ClientResult<()> {
        self.store.append_pending(kind, &data, Timestamp::now())?;
        let count = self.pending_count();
        self.set_status(SyncStatus::Queued(count));
        Ok(())
    }

    fn schedule_sync(self: &Arc<Self>) {
        if !self.config.auto_sync {
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let _ = engine.sync_now().await;
        });
    }

    // ── Sync loop ────────────────────────────────────────────────

    /// Runs one sync pass. At most one runs at a time; a second caller
    /// gets [`ClientError::SyncInProgress`] immediately.
    pub fn sync_now(
        self: &Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ClientResult<()>> + Send + '_>> {
        Box::pin(async move {
            let Ok(_guard) = self.sync_guard.try_lock() else {
                return Err(ClientError::SyncInProgress);
            };
            self.set_status(SyncStatus::Syncing);

            match self.run_sync().await {
                Ok(()) => {
                    self.attempts.store(0, Ordering::SeqCst);
                    let remaining = self.pending_count();
                    self.set_status(if remaining == 0 {
                        SyncStatus::Synced
                    } else {
                        SyncStatus::Queued(remaining)
                    });
                    Ok(())
                }
                Err(e) => {
                    let remaining = self.pending_count();
                    self.set_status(SyncStatus::Queued(remaining));
                    warn!(error = %e, queued = remaining, "sync pass failed");

                    let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if self.config.auto_sync && attempt < self.config.max_sync_attempts {
                        let delay = self.config.backoff_base
                            * self.config.backoff_factor.saturating_pow(attempt - 1);
                        debug!(attempt, ?delay, "scheduling sync retry");
                        let engine = Arc::clone(self);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let _ = engine.sync_now().await;
                        });
                    }
                    Err(e)
                }
            }
        })
    }

    async fn run_sync(&self) -> ClientResult<()> {
        let base = self.pool.acquire().ok_or(ClientError::NoServers)?;
        let first_sync = !self.first_sync_done.load(Ordering::SeqCst);

        if first_sync {
            // Push everything we hold; 409 means the server already knows
            let (lists, items): (Vec<ListRecord>, Vec<Vec<ItemRecord>>) = {
                let replica = self.replica.lock().await;
                let lists = replica.lists();
                let items = lists.iter().map(|l| replica.items_for(&l.id)).collect();
                (lists, items)
            };
            for list in &lists {
                self.push_create_list(&base, list).await?;
            }
            for item in items.iter().flatten() {
                self.push_add_item(&base, item).await?;
            }
        }

        // Drain the queue in the client's declared timestamp order; mark
        // each acknowledged op before moving on so an abort loses nothing
        let ops = self.store.unsynced_ops()?;
        for op in &ops {
            self.push_op(&base, op).await?;
            self.store.mark_synced(&[op.id])?;
        }
        let cleared = self.store.clear_synced()?;
        if cleared > 0 {
            debug!(cleared, "pending queue drained");
        }

        if first_sync {
            let known: Vec<ListId> = {
                self.replica.lock().await.lists().iter().map(|l| l.id).collect()
            };
            for id in known {
                self.pull_list(&base, id).await?;
            }
            self.first_sync_done.store(true, Ordering::SeqCst);
        }

        self.store
            .set_meta(META_LAST_SYNC, &Timestamp::now().to_string())?;
        Ok(())
    }

    async fn push_op(&self, base: &str, op: &PendingOp) -> ClientResult<()> {
        match op.kind {
            OpKind::CreateList => {
                let record: ListRecord = serde_json::from_value(op.data.clone())?;
                self.push_create_list(base, &record).await
            }
            OpKind::DeleteList => {
                let record: ListRecord = serde_json::from_value(op.data.clone())?;
                let resp = self
                    .request(base, |http| {
                        http.delete(format!("{base}/api/lists/{}", record.id))
                    })
                    .await?;
                self.accept(resp, &[StatusCode::NOT_FOUND]).await
            }
            OpKind::AddItem => {
                let record: ItemRecord = serde_json::from_value(op.data.clone())?;
                self.push_add_item(base, &record).await
            }
            OpKind::UpdateName => {
                let record: ItemRecord = serde_json::from_value(op.data.clone())?;
                let body = serde_json::json!({
                    "name": record.name,
                    "vectorClock": record.vector_clock,
                    "lastUpdated": record.last_updated,
                });
                let resp = self
                    .request(base, |http| {
                        http.patch(format!("{base}/api/items/{}/name", record.id)).json(&body)
                    })
                    .await?;
                self.accept(resp, &[StatusCode::NOT_FOUND]).await
            }
            OpKind::UpdateQuantity => {
                let record: ItemRecord = serde_json::from_value(op.data.clone())?;
                let body = serde_json::json!({
                    "quantity": record.quantity,
                    "acquired": record.acquired,
                    "vectorClock": record.vector_clock,
                    "lastUpdated": record.last_updated,
                });
                let resp = self
                    .request(base, |http| {
                        http.patch(format!("{base}/api/items/{}/quantity", record.id)).json(&body)
                    })
                    .await?;
                self.accept(resp, &[StatusCode::NOT_FOUND]).await
            }
            OpKind::ToggleCheck => {
                let record: ItemRecord = serde_json::from_value(op.data.clone())?;
                let body = serde_json::json!({
                    "acquired": record.acquired,
                    "vectorClock": record.vector_clock,
                    "lastUpdated": record.last_updated,
                });
                let resp = self
                    .request(base, |http| {
                        http.patch(format!("{base}/api/items/{}/toggle", record.id)).json(&body)
                    })
                    .await?;
                self.accept(resp, &[StatusCode::NOT_FOUND]).await
            }
            OpKind::RemoveItem => {
                let record: ItemRecord = serde_json::from_value(op.data.clone())?;
                let resp = self
                    .request(base, |http| {
                        http.delete(format!("{base}/api/items/{}", record.id))
                    })
                    .await?;
                self.accept(resp, &[StatusCode::NOT_FOUND]).await
            }
        }
    }

    async fn push_create_list(&self, base: &str, record: &ListRecord) -> ClientResult<()> {
        let resp = self
            .request(base, |http| {
                http.post(format!("{base}/api/lists")).json(record)
            })
            .await?;
        // 409: idempotent create, the cluster already has it
        self.accept(resp, &[StatusCode::CONFLICT]).await
    }

    async fn push_add_item(&self, base: &str, record: &ItemRecord) -> ClientResult<()> {
        let resp = self
            .request(base, |http| {
                http.post(format!("{base}/api/lists/{}/items", record.list_id))
                    .json(record)
            })
            .await?;
        // 409: already there; 404: the list is gone, the add is moot
        self.accept(resp, &[StatusCode::CONFLICT, StatusCode::NOT_FOUND])
            .await
    }

    /// Sends one request, marking the node failed on transport errors.
    async fn request<F>(&self, base: &str, build: F) -> ClientResult<reqwest::Response>
    where
        F: FnOnce(&reqwest::Client) -> reqwest::RequestBuilder,
    {
        match build(&self.http).send().await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                self.pool.mark_failed(base);
                Err(e.into())
            }
        }
    }

    /// Treats 2xx and the listed benign statuses as success; everything
    /// else aborts the pass and is retried with backoff.
    async fn accept(&self, resp: reqwest::Response, benign: &[StatusCode]) -> ClientResult<()> {
        let status = resp.status();
        if status.is_success() || benign.contains(&status) {
            return Ok(());
        }
        let detail = resp.text().await.unwrap_or_default();
        Err(ClientError::Rejected {
            status: status.as_u16(),
            detail,
        })
    }

    async fn pull_list(&self, base: &str, id: ListId) -> ClientResult<()> {
        let resp = self
            .request(base, |http| http.get(format!("{base}/api/lists/{id}")))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            // The cluster does not have it yet; our push will seed it
            return Ok(());
        }
        if !resp.status().is_success() {
            return Err(ClientError::Rejected {
                status: resp.status().as_u16(),
                detail: String::new(),
            });
        }
        let body: serde_json::Value = resp.json().await?;
        let record: ListRecord = serde_json::from_value(body.clone())?;
        let items: Vec<ItemRecord> =
            serde_json::from_value(body.get("items").cloned().unwrap_or_default())
                .unwrap_or_default();

        let mut replica = self.replica.lock().await;
        replica.apply_remote_list(&record)?;
        for item in &items {
            replica.apply_remote_item(item, RemoteScope::Full, false)?;
        }
        Ok(())
    }

    // ── Server-pushed events ─────────────────────────────────────

    /// Merges one coordinator event into local state. Events for lists
    /// this client has never loaded are dropped (privacy boundary).
    pub async fn apply_event(&self, event: ChangeEvent) -> ClientResult<()> {
        let mut replica = self.replica.lock().await;
        if !replica.knows_list(&event.list_id()) {
            debug!(event = event.name(), "dropping event for unknown list");
            return Ok(());
        }
        match event {
            ChangeEvent::ListCreated(record) => replica.apply_remote_list(&record),
            ChangeEvent::ListDeleted(deleted) => replica.apply_remote_list_deleted(&deleted.id),
            ChangeEvent::ItemAdded(record) => {
                replica.apply_remote_item(&record, RemoteScope::Full, true)
            }
            ChangeEvent::ItemRemoved(removed) => replica.apply_remote_item_removed(&removed.id),
            ChangeEvent::ItemToggled(record) => {
                replica.apply_remote_item(&record, RemoteScope::AcquiredOnly, false)
            }
            ChangeEvent::ItemNameUpdated(record) => {
                replica.apply_remote_item(&record, RemoteScope::NameOnly, false)
            }
            ChangeEvent::ItemQuantityUpdated(record) => {
                replica.apply_remote_item(&record, RemoteScope::Quantities, false)
            }
            ChangeEvent::ItemUpdated(record) => {
                replica.apply_remote_item(&record, RemoteScope::Full, false)
            }
        }
    }
}
