//! Error types for the storage layer.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A persisted CRDT column failed to parse.
    #[error("corrupt row: {0}")]
    CorruptRow(#[from] serde_json::Error),

    /// A persisted identifier failed to parse.
    #[error("corrupt id: {0}")]
    CorruptId(#[from] uuid::Error),

    /// A persisted operation kind is unknown.
    #[error("unknown operation kind: {0}")]
    UnknownOpKind(String),
}
