//! Quorum coordinator: sloppy-quorum reads and writes over the preference
//! list.
//!
//! The node handling a client request applies locally first, then hands the
//! replica fan-out to this coordinator. Writes succeed once W replicas
//! (counting the local apply) acknowledge; reads need R valid responses and
//! reconcile divergent versions by vector clock, falling back to the
//! greater `lastUpdated` for concurrent pairs.

use crate::channel::PeerChannel;
use crate::config::QuorumParams;
use crate::error::{ClusterError, ClusterResult};
use crate::protocol::{DataType, NodeMessage, NodeReply};
use crate::ring::HashRing;
use basket_crdt::{CausalOrder, VectorClock};
use basket_types::{NodeId, Timestamp};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Result of a quorum write fan-out.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// Replicas that acknowledged (the local node always leads).
    pub succeeded: Vec<NodeId>,
    /// Replicas that failed or timed out; candidates for hinted handoff.
    pub failed: Vec<NodeId>,
    /// Whether at least W replicas acknowledged.
    pub quorum_met: bool,
}

/// Fan-out coordinator for one storage node.
pub struct QuorumCoordinator {
    local: NodeId,
    params: QuorumParams,
    ring: HashRing,
    peers: HashMap<NodeId, Arc<PeerChannel>>,
    replica_timeout: Duration,
}

impl QuorumCoordinator {
    /// Creates a coordinator. `peers` maps every other node to its mesh
    /// channel.
    #[must_use]
    pub fn new(
        local: NodeId,
        params: QuorumParams,
        ring: HashRing,
        peers: HashMap<NodeId, Arc<PeerChannel>>,
        replica_timeout: Duration,
    ) -> Self {
        if params.r + params.w <= params.n {
            warn!(
                n = params.n,
                r = params.r,
                w = params.w,
                "R + W <= N: acknowledged writes are not guaranteed visible to the next read"
            );
        }
        Self {
            local,
            params,
            ring,
            peers,
            replica_timeout,
        }
    }

    /// The quorum parameters in force.
    #[must_use]
    pub fn params(&self) -> QuorumParams {
        self.params
    }

    /// The N replicas responsible for a key.
    #[must_use]
    pub fn preference_list(&self, key: &str) -> Vec<NodeId> {
        self.ring.preference_list(key, self.params.n)
    }

    /// Fans a write out to the key's remote replicas.
    ///
    /// The local apply has already happened and counts as one success.
    pub async fn write(&self, key: &str, message: &NodeMessage) -> WriteOutcome {
        let remotes: Vec<NodeId> = self
            .preference_list(key)
            .into_iter()
            .filter(|node| *node != self.local)
            .collect();

        let mut succeeded = vec![self.local.clone()];
        let mut failed = Vec::new();

        let calls = remotes.iter().map(|node| {
            let channel = self.peers.get(node).map(Arc::clone);
            async move {
                let result = match channel {
                    Some(channel) => channel.request(message, self.replica_timeout).await,
                    None => Err(ClusterError::Config(format!("no channel for {node}"))),
                };
                (node.clone(), result)
            }
        });

        for (node, result) in join_all(calls).await {
            match result {
                Ok(reply) if reply.is_ok() => succeeded.push(node),
                Ok(reply) => {
                    debug!(replica = %node, error = ?reply.error, "replica rejected write");
                    failed.push(node);
                }
                Err(e) => {
                    debug!(replica = %node, error = %e, "replica unreachable");
                    failed.push(node);
                }
            }
        }

        let quorum_met = succeeded.len() >= self.params.w;
        if !quorum_met {
            warn!(
                key,
                acks = succeeded.len(),
                w = self.params.w,
                "write quorum not met"
            );
        }
        WriteOutcome {
            succeeded,
            failed,
            quorum_met,
        }
    }

    /// Quorum read of a key.
    ///
    /// `local_read` supplies this node's own copy when it is one of the
    /// key's replicas. A reply with null data is a valid "I hold nothing"
    /// response and counts toward R; fewer than R responses of any kind is
    /// a quorum failure.
    pub async fn read<F>(
        &self,
        key: &str,
        data_type: DataType,
        local_read: F,
    ) -> ClusterResult<Option<serde_json::Value>>
    where
        F: FnOnce() -> Option<serde_json::Value>,
    {
        let prefs = self.preference_list(key);
        let mut responses: Vec<Option<serde_json::Value>> = Vec::new();

        let remotes: Vec<&NodeId> = prefs.iter().filter(|node| **node != self.local).collect();
        if remotes.len() < prefs.len() {
            responses.push(local_read());
        }

        let message = NodeMessage::Read {
            key: key.to_string(),
            data_type,
        };
        let calls = remotes.iter().map(|node| {
            let channel = self.peers.get(*node).map(Arc::clone);
            let message = &message;
            async move {
                match channel {
                    Some(channel) => channel.request(message, self.replica_timeout).await,
                    None => Err(ClusterError::Config(format!("no channel for {node}"))),
                }
            }
        });

        for result in join_all(calls).await {
            if let Ok(reply) = result {
                if reply.is_ok() {
                    responses.push(reply.data.filter(|d| !d.is_null()));
                }
            }
        }

        if responses.len() < self.params.r {
            return Err(ClusterError::QuorumUnavailable(format!(
                "read quorum not met for {key}: {} of {} responses",
                responses.len(),
                self.params.r
            )));
        }

        Ok(reconcile(responses))
    }
}

/// Picks the winning version out of a set of replica responses.
///
/// Candidate starts at the first value; every further value either wins
/// outright (candidate causally before it), loses (after or equal), or is
/// concurrent, in which case the greater `lastUpdated` takes it.
fn reconcile(responses: Vec<Option<serde_json::Value>>) -> Option<serde_json::Value> {
    let mut candidate: Option<serde_json::Value> = None;
    for response in responses.into_iter().flatten() {
        candidate = Some(match candidate {
            None => response,
            Some(current) => pick_winner(current, response),
        });
    }
    candidate
}

fn pick_winner(candidate: serde_json::Value, response: serde_json::Value) -> serde_json::Value {
    let (candidate_clock, candidate_updated) = version_of(&candidate);
    let (response_clock, response_updated) = version_of(&response);

    match candidate_clock.compare(&response_clock) {
        CausalOrder::Before => response,
        CausalOrder::Concurrent if response_updated > candidate_updated => response,
        _ => candidate,
    }
}

/// Extracts the version metadata of a READ payload. List payloads nest the
/// record under `"list"`; item payloads are the record itself.
fn version_of(value: &serde_json::Value) -> (VectorClock, Timestamp) {
    let core = value.get("list").unwrap_or(value);
    let clock = core
        .get("vectorClock")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or_default();
    let updated = core
        .get("lastUpdated")
        .and_then(serde_json::Value::as_u64)
        .map(Timestamp::from_millis)
        .unwrap_or_default();
    (clock, updated)
}
