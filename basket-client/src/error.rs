//! Error types for the client engine.

use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP transport failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server rejected a request for a reason retries will not fix.
    #[error("server rejected request: {status} {detail}")]
    Rejected { status: u16, detail: String },

    /// Local durable store failure.
    #[error("storage error: {0}")]
    Store(#[from] basket_store::StoreError),

    /// Wire decode/encode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The entity is unknown locally.
    #[error("not found: {0}")]
    NotFound(String),

    /// A sync pass is already running.
    #[error("sync already in progress")]
    SyncInProgress,

    /// The pool has no servers to talk to.
    #[error("no servers configured")]
    NoServers,
}
