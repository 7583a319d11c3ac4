//! Hinted handoff.
//!
//! Writes that could not be delivered to a replica are parked here, one
//! FIFO per target node. A periodic task drains each queue in order; the
//! first failure for a target aborts that target's drain until the next
//! round, preserving delivery order per replica.

use crate::channel::PeerChannel;
use crate::protocol::NodeMessage;
use basket_types::NodeId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Per-target queues of undelivered replica writes.
#[derive(Default)]
pub struct HintQueue {
    queues: Mutex<HashMap<NodeId, VecDeque<NodeMessage>>>,
}

impl HintQueue {
    /// Creates an empty queue set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a write for later delivery to `target`.
    pub fn push(&self, target: NodeId, message: NodeMessage) {
        let mut queues = self.queues.lock().unwrap();
        queues.entry(target).or_default().push_back(message);
    }

    /// Total number of parked writes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queues.lock().unwrap().values().map(VecDeque::len).sum()
    }

    /// Returns true if nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of parked writes for one target.
    #[must_use]
    pub fn pending_for(&self, target: &NodeId) -> usize {
        self.queues
            .lock()
            .unwrap()
            .get(target)
            .map_or(0, VecDeque::len)
    }

    fn pop_front(&self, target: &NodeId) -> Option<NodeMessage> {
        self.queues.lock().unwrap().get_mut(target)?.pop_front()
    }

    fn push_front(&self, target: NodeId, message: NodeMessage) {
        self.queues
            .lock()
            .unwrap()
            .entry(target)
            .or_default()
            .push_front(message);
    }

    fn targets(&self) -> Vec<NodeId> {
        self.queues.lock().unwrap().keys().cloned().collect()
    }

    /// Drains every target's queue in FIFO order. The first failed delivery
    /// for a target aborts that target's drain; remaining hints wait for
    /// the next round. Returns the number of delivered hints.
    pub async fn flush(
        &self,
        peers: &HashMap<NodeId, Arc<PeerChannel>>,
        deadline: Duration,
    ) -> usize {
        let mut delivered = 0;

        for target in self.targets() {
            let Some(channel) = peers.get(&target) else {
                continue;
            };

            while let Some(message) = self.pop_front(&target) {
                let ok = matches!(
                    channel.request(&message, deadline).await,
                    Ok(reply) if reply.is_ok()
                );
                if ok {
                    delivered += 1;
                } else {
                    debug!(target = %target, "replica still unreachable, aborting drain");
                    self.push_front(target.clone(), message);
                    break;
                }
            }
        }

        if delivered > 0 {
            info!(delivered, "hinted handoff flushed");
        }
        delivered
    }
}

/// Spawns the periodic drain task.
///
/// The first drain is offset by a random fraction of the interval so
/// restarted nodes do not all hammer a recovering replica in the same
/// instant.
pub fn spawn_flusher(
    queue: Arc<HintQueue>,
    peers: HashMap<NodeId, Arc<PeerChannel>>,
    interval: Duration,
    deadline: Duration,
) -> JoinHandle<()> {
    let jitter = Duration::from_millis(rand::Rng::gen_range(
        &mut rand::thread_rng(),
        0..=interval.as_millis().min(5_000) as u64,
    ));
    tokio::spawn(async move {
        tokio::time::sleep(jitter).await;
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick fires immediately; skip it so a restart does not race
        // the mesh listeners coming up
        ticker.tick().await;
        loop {
            ticker.tick().await;
            queue.flush(&peers, deadline).await;
        }
    })
}
