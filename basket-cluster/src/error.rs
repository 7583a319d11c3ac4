//! Error types for the cluster layer, with HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Result type for cluster operations.
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Errors that can occur in cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// Malformed input from a client.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Entity unknown locally and, for reads, after a quorum read too.
    #[error("not found: {0}")]
    NotFound(String),

    /// An entity with the same id already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// R or W could not be met.
    #[error("quorum unavailable: {0}")]
    QuorumUnavailable(String),

    /// A replica did not answer within the deadline.
    #[error("peer timed out")]
    Timeout,

    /// A peer answered with an error status.
    #[error("peer error: {0}")]
    Peer(String),

    /// Transport failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wire decode/encode failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Durable store failure.
    #[error("storage error: {0}")]
    Store(#[from] basket_store::StoreError),

    /// Bad cluster configuration.
    #[error("config error: {0}")]
    Config(String),
}

impl ClusterError {
    /// HTTP status this error surfaces as.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::QuorumUnavailable(_) | Self::Timeout | Self::Peer(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Io(_) | Self::Serialization(_) | Self::Store(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ClusterError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
