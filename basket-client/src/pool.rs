//! Round-robin server pool with failure marking and rehabilitation.
//!
//! The client talks to any storage node for reads and writes; the SSE
//! subscription only ever connects to the coordinator. Nodes that fail an
//! exchange are skipped by the round robin until a periodic health probe
//! brings them back. When every node is marked failed, the pool hands out
//! the full list again rather than refusing to try.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Interval between health probes of failed nodes.
pub const DEFAULT_HEALTH_POLL: Duration = Duration::from_secs(10);

struct PoolState {
    cursor: usize,
    failed: HashSet<String>,
}

/// Round-robin pool of storage-node base URLs plus the coordinator URL.
pub struct ServerPool {
    servers: Vec<String>,
    coordinator: String,
    state: Mutex<PoolState>,
    http: reqwest::Client,
}

impl ServerPool {
    /// Creates a pool. `servers` are node base URLs (`http://host:port`).
    #[must_use]
    pub fn new(servers: Vec<String>, coordinator: impl Into<String>) -> Self {
        Self {
            servers,
            coordinator: coordinator.into(),
            state: Mutex::new(PoolState {
                cursor: 0,
                failed: HashSet::new(),
            }),
            http: reqwest::Client::new(),
        }
    }

    /// The coordinator's base URL (SSE only ever connects here).
    #[must_use]
    pub fn coordinator_url(&self) -> &str {
        &self.coordinator
    }

    /// All configured node URLs.
    #[must_use]
    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Picks the next node, round-robin, skipping failed ones. When every
    /// node is failed, falls back to plain round robin over the full list.
    #[must_use]
    pub fn acquire(&self) -> Option<String> {
        if self.servers.is_empty() {
            return None;
        }
        let mut state = self.state.lock().unwrap();
        let all_failed = state.failed.len() >= self.servers.len();

        for _ in 0..self.servers.len() {
            let candidate = self.servers[state.cursor % self.servers.len()].clone();
            state.cursor = state.cursor.wrapping_add(1);
            if all_failed || !state.failed.contains(&candidate) {
                return Some(candidate);
            }
        }
        None
    }

    /// Marks a node failed after an I/O error.
    pub fn mark_failed(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        if state.failed.insert(url.to_string()) {
            debug!(url, "node marked failed");
        }
    }

    /// Marks a node healthy again.
    pub fn mark_healthy(&self, url: &str) {
        let mut state = self.state.lock().unwrap();
        if state.failed.remove(url) {
            info!(url, "node rehabilitated");
        }
    }

    /// Number of nodes currently marked failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.state.lock().unwrap().failed.len()
    }

    /// Probes `/api/health` on every failed node and rehabilitates the ones
    /// that answer.
    pub async fn rehabilitate(&self) {
        let failed: Vec<String> = {
            let state = self.state.lock().unwrap();
            state.failed.iter().cloned().collect()
        };
        for url in failed {
            let healthy = self
                .http
                .get(format!("{url}/api/health"))
                .timeout(Duration::from_secs(2))
                .send()
                .await
                .map(|resp| resp.status().is_success())
                .unwrap_or(false);
            if healthy {
                self.mark_healthy(&url);
            }
        }
    }

    /// Spawns the periodic rehabilitation task.
    pub fn spawn_health_task(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if pool.failed_count() > 0 {
                    pool.rehabilitate().await;
                }
            }
        })
    }
}
