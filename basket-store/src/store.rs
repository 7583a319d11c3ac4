//! The durable local store.

use crate::error::{StoreError, StoreResult};
use basket_crdt::VectorClock;
use basket_model::{ItemRecord, ListRecord, OpKind, PendingOp};
use basket_types::{ItemId, ListId, Timestamp};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Transactional key-addressable storage for lists, items, pending
/// operations, and process metadata.
///
/// The connection is shared behind a mutex; callers on async tasks hold it
/// only for the duration of a statement or transaction. Clones share the
/// same connection.
#[derive(Clone)]
pub struct LocalStore {
    conn: Arc<Mutex<Connection>>,
}

impl LocalStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS lists (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_updated INTEGER NOT NULL,
                vector_clock TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS items (
                id TEXT PRIMARY KEY,
                list_id TEXT NOT NULL REFERENCES lists(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                acquired INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                last_updated INTEGER NOT NULL,
                vector_clock TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_items_list_id ON items(list_id);
            CREATE INDEX IF NOT EXISTS idx_items_last_updated ON items(last_updated);
            CREATE INDEX IF NOT EXISTS idx_lists_last_updated ON lists(last_updated);

            CREATE TABLE IF NOT EXISTS pending_ops (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                data TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                synced INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_pending_ops_synced ON pending_ops(synced, timestamp);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    // ── Lists ────────────────────────────────────────────────────

    /// Upserts a list row.
    pub fn save_list(&self, list: &ListRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO lists (id, name, created_at, last_updated, vector_clock)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                last_updated = excluded.last_updated,
                vector_clock = excluded.vector_clock",
            params![
                list.id.to_string(),
                list.name,
                list.created_at.as_millis() as i64,
                list.last_updated.as_millis() as i64,
                serde_json::to_string(&list.vector_clock)?,
            ],
        )?;
        Ok(())
    }

    /// Loads a list by id.
    pub fn get_list(&self, id: &ListId) -> StoreResult<Option<ListRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, name, created_at, last_updated, vector_clock
             FROM lists WHERE id = ?1",
            params![id.to_string()],
            row_to_list,
        )
        .optional()?
        .transpose()
    }

    /// Loads every list, most recently updated first.
    pub fn all_lists(&self) -> StoreResult<Vec<ListRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, created_at, last_updated, vector_clock
             FROM lists ORDER BY last_updated DESC",
        )?;
        let rows = stmt.query_map([], row_to_list)?;
        let mut lists = Vec::new();
        for row in rows {
            lists.push(row??);
        }
        Ok(lists)
    }

    /// Deletes a list and every item belonging to it, atomically.
    ///
    /// Returns true if the list row existed.
    pub fn delete_list(&self, id: &ListId) -> StoreResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let items = tx.execute("DELETE FROM items WHERE list_id = ?1", params![id.to_string()])?;
        let lists = tx.execute("DELETE FROM lists WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        debug!(list = %id, items, "deleted list with cascade");
        Ok(lists > 0)
    }

    // ── Items ────────────────────────────────────────────────────

    /// Upserts an item row. `list_id` and `created_at` never change on
    /// conflict.
    pub fn save_item(&self, item: &ItemRecord) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO items (id, list_id, name, quantity, acquired, created_at, last_updated, vector_clock)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                quantity = excluded.quantity,
                acquired = excluded.acquired,
                last_updated = excluded.last_updated,
                vector_clock = excluded.vector_clock",
            params![
                item.id.to_string(),
                item.list_id.to_string(),
                item.name,
                item.quantity,
                item.acquired,
                item.created_at.as_millis() as i64,
                item.last_updated.as_millis() as i64,
                serde_json::to_string(&item.vector_clock)?,
            ],
        )?;
        Ok(())
    }

    /// Loads an item by id.
    pub fn get_item(&self, id: &ItemId) -> StoreResult<Option<ItemRecord>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id, list_id, name, quantity, acquired, created_at, last_updated, vector_clock
             FROM items WHERE id = ?1",
            params![id.to_string()],
            row_to_item,
        )
        .optional()?
        .transpose()
    }

    /// Loads the items of one list, oldest first.
    pub fn items_for_list(&self, list_id: &ListId) -> StoreResult<Vec<ItemRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, list_id, name, quantity, acquired, created_at, last_updated, vector_clock
             FROM items WHERE list_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![list_id.to_string()], row_to_item)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    /// Loads every item in the store.
    pub fn all_items(&self) -> StoreResult<Vec<ItemRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, list_id, name, quantity, acquired, created_at, last_updated, vector_clock
             FROM items ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_item)?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row??);
        }
        Ok(items)
    }

    /// Deletes an item row. Returns true if it existed.
    pub fn delete_item(&self, id: &ItemId) -> StoreResult<bool> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM items WHERE id = ?1", params![id.to_string()])?;
        Ok(n > 0)
    }

    // ── Pending operations ───────────────────────────────────────

    /// Appends a pending operation, returning its queue id.
    pub fn append_pending(
        &self,
        kind: OpKind,
        data: &serde_json::Value,
        timestamp: Timestamp,
    ) -> StoreResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO pending_ops (kind, data, timestamp, synced) VALUES (?1, ?2, ?3, 0)",
            params![
                kind.as_str(),
                serde_json::to_string(data)?,
                timestamp.as_millis() as i64,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns all unsynced operations as one consistent snapshot, sorted
    /// by ascending timestamp (queue id breaks ties).
    pub fn unsynced_ops(&self) -> StoreResult<Vec<PendingOp>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let ops = {
            let mut stmt = tx.prepare(
                "SELECT id, kind, data, timestamp, synced
                 FROM pending_ops WHERE synced = 0
                 ORDER BY timestamp ASC, id ASC",
            )?;
            let rows = stmt.query_map([], row_to_pending)?;
            let mut ops = Vec::new();
            for row in rows {
                ops.push(row??);
            }
            ops
        };
        tx.commit()?;
        Ok(ops)
    }

    /// Number of unsynced operations in the queue.
    pub fn pending_count(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM pending_ops WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Flags the given operations as acknowledged by the cluster.
    pub fn mark_synced(&self, ids: &[i64]) -> StoreResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for id in ids {
            tx.execute("UPDATE pending_ops SET synced = 1 WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes every acknowledged operation.
    pub fn clear_synced(&self) -> StoreResult<usize> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM pending_ops WHERE synced = 1", [])?;
        Ok(n)
    }

    // ── Metadata ─────────────────────────────────────────────────

    /// Reads a metadata value.
    pub fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Writes a metadata value.
    pub fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

// ── Row mapping ──────────────────────────────────────────────────

type MappedRow<T> = Result<StoreResult<T>, rusqlite::Error>;

fn row_to_list(row: &Row<'_>) -> MappedRow<ListRecord> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let created_at: i64 = row.get(2)?;
    let last_updated: i64 = row.get(3)?;
    let clock: String = row.get(4)?;
    Ok(build_list(id, name, created_at, last_updated, clock))
}

fn build_list(
    id: String,
    name: String,
    created_at: i64,
    last_updated: i64,
    clock: String,
) -> StoreResult<ListRecord> {
    Ok(ListRecord {
        id: ListId::parse(&id).map_err(StoreError::CorruptId)?,
        name,
        created_at: Timestamp::from_millis(created_at as u64),
        last_updated: Timestamp::from_millis(last_updated as u64),
        vector_clock: serde_json::from_str::<VectorClock>(&clock)?,
    })
}

fn row_to_item(row: &Row<'_>) -> MappedRow<ItemRecord> {
    let id: String = row.get(0)?;
    let list_id: String = row.get(1)?;
    let name: String = row.get(2)?;
    let quantity: i64 = row.get(3)?;
    let acquired: i64 = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    let last_updated: i64 = row.get(6)?;
    let clock: String = row.get(7)?;
    Ok(build_item(
        id, list_id, name, quantity, acquired, created_at, last_updated, clock,
    ))
}

#[allow(clippy::too_many_arguments)]
fn build_item(
    id: String,
    list_id: String,
    name: String,
    quantity: i64,
    acquired: i64,
    created_at: i64,
    last_updated: i64,
    clock: String,
) -> StoreResult<ItemRecord> {
    Ok(ItemRecord {
        id: ItemId::parse(&id).map_err(StoreError::CorruptId)?,
        list_id: ListId::parse(&list_id).map_err(StoreError::CorruptId)?,
        name,
        quantity,
        acquired,
        created_at: Timestamp::from_millis(created_at as u64),
        last_updated: Timestamp::from_millis(last_updated as u64),
        vector_clock: serde_json::from_str::<VectorClock>(&clock)?,
    })
}

fn row_to_pending(row: &Row<'_>) -> MappedRow<PendingOp> {
    let id: i64 = row.get(0)?;
    let kind: String = row.get(1)?;
    let data: String = row.get(2)?;
    let timestamp: i64 = row.get(3)?;
    let synced: bool = row.get(4)?;
    Ok(build_pending(id, kind, data, timestamp, synced))
}

fn build_pending(
    id: i64,
    kind: String,
    data: String,
    timestamp: i64,
    synced: bool,
) -> StoreResult<PendingOp> {
    let kind = OpKind::parse(&kind).ok_or(StoreError::UnknownOpKind(kind.clone()))?;
    Ok(PendingOp {
        id,
        kind,
        data: serde_json::from_str(&data)?,
        timestamp: Timestamp::from_millis(timestamp as u64),
        synced,
    })
}
