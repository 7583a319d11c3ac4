//! SQLite-backed durable local store for Basket.
//!
//! Both storage nodes and clients persist through this crate: lists and
//! items as plain-value rows with a serialized vector clock column, the
//! client's pending-operation queue, and a small metadata bag (node
//! identity, last-sync watermark).
//!
//! Guarantees the rest of the system leans on:
//! - `save_list` / `save_item` are upserts.
//! - `delete_list` removes the list row and every item row with that
//!   `list_id` in one transaction.
//! - `unsynced_ops` returns a consistent snapshot sorted by ascending
//!   timestamp.
//! - `mark_synced` and `clear_synced` are separate steps, so a crash
//!   between acknowledgment and cleanup only costs a harmless replay.

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::LocalStore;

/// Metadata key under which a process stores its node identity.
pub const META_NODE_ID: &str = "node_id";

/// Metadata key for the client's last successful sync watermark.
pub const META_LAST_SYNC: &str = "last_sync";
