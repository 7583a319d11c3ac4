//! Core type definitions for Basket.
//!
//! This crate defines the fundamental types shared by every layer of the
//! store:
//! - List, item, and node identifiers
//! - Millisecond wall-clock timestamps
//!
//! Domain aggregates (lists, items) live in `basket-model`; CRDT machinery
//! lives in `basket-crdt`. Nothing here performs I/O.

mod ids;
mod timestamp;

pub use ids::{ItemId, ListId, NodeId};
pub use timestamp::Timestamp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}
