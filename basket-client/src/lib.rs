//! Local-first client sync engine for Basket.
//!
//! Every user action commits to the local durable store before any network
//! attempt, and appends a pending operation to a durable queue. A sync loop
//! drains the queue against any reachable storage node (with exponential
//! backoff while the cluster is away), and a streaming consumer merges the
//! coordinator's server-sent events into local state using the same CRDT
//! rules the nodes apply.

mod engine;
mod error;
mod events;
mod pool;
mod replica;

pub use engine::{ClientConfig, SyncEngine, SyncStatus};
pub use error::{ClientError, ClientResult};
pub use events::{
    parse_event_block, spawn_event_consumer, DEFAULT_RECONNECT_DELAY, DEFAULT_SSE_PROBE,
};
pub use pool::{ServerPool, DEFAULT_HEALTH_POLL};
pub use replica::{LocalReplica, RemoteScope};
