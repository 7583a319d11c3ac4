//! Cluster coordinator: SSE fan-out of change events.
//!
//! Storage nodes push `BROADCAST` envelopes over the mesh; the coordinator
//! re-emits each event on an in-process broadcast bus and streams it to
//! every connected `/api/events` subscriber as a named server-sent event.
//! It holds no durable state and sits outside the read/write critical path.

use crate::mesh::MeshHandler;
use crate::protocol::{NodeMessage, NodeReply};
use async_trait::async_trait;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use basket_model::ChangeEvent;
use basket_types::Timestamp;
use futures::Stream;
use futures::StreamExt;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, trace};

/// Interval between SSE keep-alive comments.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Buffered events per subscriber before a slow consumer starts losing.
const SUBSCRIBER_BUFFER: usize = 256;

/// The SSE fan-out hub.
pub struct Coordinator {
    events: broadcast::Sender<ChangeEvent>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    /// Creates the hub.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self { events }
    }

    /// Subscribes to the event bus.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }

    /// Publishes an event to every subscriber. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        trace!(event = event.name(), "fan-out");
        self.events.send(event).unwrap_or(0)
    }

    /// Number of connected subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }
}

#[async_trait]
impl MeshHandler for Coordinator {
    async fn handle(&self, message: NodeMessage) -> NodeReply {
        match message {
            NodeMessage::Broadcast { event, data } => {
                match ChangeEvent::from_wire(&event, data) {
                    Some(change) => {
                        self.publish(change);
                        NodeReply::ok()
                    }
                    None => {
                        debug!(event, "dropping unknown broadcast event");
                        NodeReply::error(format!("unknown event: {event}"))
                    }
                }
            }
            _ => NodeReply::error("coordinator only accepts BROADCAST"),
        }
    }
}

/// Builds the coordinator's HTTP router.
pub fn build_router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/events", get(events))
        .with_state(coordinator)
}

async fn health(State(coordinator): State<Arc<Coordinator>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "subscribers": coordinator.subscriber_count(),
        "timestamp": Timestamp::now(),
    }))
}

async fn events(
    State(coordinator): State<Arc<Coordinator>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(coordinator.subscribe()).filter_map(|result| async move {
        // A lagged subscriber skips the overwritten events and keeps going;
        // clients resolve state by vector clock, not by event arrival
        let change = result.ok()?;
        Some(Ok::<_, Infallible>(
            Event::default()
                .event(change.name())
                .data(change.data_json().to_string()),
        ))
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
