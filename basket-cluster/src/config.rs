//! Static cluster configuration.
//!
//! One JSON file describes the whole cluster: the HTTP ports of the storage
//! nodes, the quorum parameters, the coordinator's ports, and the offset
//! between a node's HTTP port and its replication-mesh port. The ring is
//! static for the lifetime of every process reading this file.

use crate::error::{ClusterError, ClusterResult};
use basket_types::NodeId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Replication factor and quorum thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuorumParams {
    pub n: usize,
    pub r: usize,
    pub w: usize,
}

impl Default for QuorumParams {
    fn default() -> Self {
        Self { n: 3, r: 2, w: 2 }
    }
}

/// Coordinator endpoints.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatorConfig {
    pub http_port: u16,
    pub mesh_port: u16,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            http_port: 4000,
            mesh_port: 5000,
        }
    }
}

/// Storage-node transport parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// A node's mesh port is its HTTP port plus this offset.
    pub mesh_port_offset: u16,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mesh_port_offset: 1000,
        }
    }
}

/// Cluster-wide static configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub num_servers: usize,
    /// HTTP ports of the storage nodes, in ring-declaration order.
    pub servers: Vec<u16>,
    #[serde(default)]
    pub quorum: QuorumParams,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Per-replica call deadline for quorum fan-out, in milliseconds.
    #[serde(default = "default_replica_timeout_ms")]
    pub replica_timeout_ms: u64,
    /// Interval between hinted-handoff drains, in seconds.
    #[serde(default = "default_handoff_flush_secs")]
    pub hinted_handoff_flush_secs: u64,
}

fn default_replica_timeout_ms() -> u64 {
    1000
}

fn default_handoff_flush_secs() -> u64 {
    30
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            num_servers: 5,
            servers: vec![4001, 4002, 4003, 4004, 4005],
            quorum: QuorumParams::default(),
            coordinator: CoordinatorConfig::default(),
            storage: StorageConfig::default(),
            replica_timeout_ms: default_replica_timeout_ms(),
            hinted_handoff_flush_secs: default_handoff_flush_secs(),
        }
    }
}

impl ClusterConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: impl AsRef<Path>) -> ClusterResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks internal consistency.
    pub fn validate(&self) -> ClusterResult<()> {
        if self.servers.is_empty() {
            return Err(ClusterError::Config("no servers configured".into()));
        }
        if self.servers.len() != self.num_servers {
            return Err(ClusterError::Config(format!(
                "numServers is {} but {} server ports are listed",
                self.num_servers,
                self.servers.len()
            )));
        }
        if self.quorum.n == 0 || self.quorum.r == 0 || self.quorum.w == 0 {
            return Err(ClusterError::Config("quorum parameters must be positive".into()));
        }
        if self.quorum.n > self.servers.len() {
            return Err(ClusterError::Config(format!(
                "replication factor {} exceeds cluster size {}",
                self.quorum.n,
                self.servers.len()
            )));
        }
        Ok(())
    }

    /// The stable node identity for a server port.
    #[must_use]
    pub fn node_id_for(port: u16) -> NodeId {
        NodeId::new(format!("node-{port}"))
    }

    /// All node identities in declaration order.
    #[must_use]
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.servers.iter().map(|&p| Self::node_id_for(p)).collect()
    }

    /// The replication-mesh port for a server's HTTP port.
    #[must_use]
    pub fn mesh_port_for(&self, http_port: u16) -> u16 {
        http_port + self.storage.mesh_port_offset
    }

    /// The replication-mesh address for a server's HTTP port.
    #[must_use]
    pub fn mesh_addr_for(&self, http_port: u16) -> String {
        format!("127.0.0.1:{}", self.mesh_port_for(http_port))
    }

    /// The coordinator's mesh address.
    #[must_use]
    pub fn coordinator_mesh_addr(&self) -> String {
        format!("127.0.0.1:{}", self.coordinator.mesh_port)
    }

    /// The HTTP port a node identity maps to, if it is part of the cluster.
    #[must_use]
    pub fn port_for(&self, node_id: &NodeId) -> Option<u16> {
        self.servers
            .iter()
            .copied()
            .find(|&p| Self::node_id_for(p) == *node_id)
    }

    /// Per-replica call deadline.
    #[must_use]
    pub fn replica_timeout(&self) -> Duration {
        Duration::from_millis(self.replica_timeout_ms)
    }

    /// Hinted-handoff drain interval.
    #[must_use]
    pub fn handoff_flush_interval(&self) -> Duration {
        Duration::from_secs(self.hinted_handoff_flush_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClusterConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.quorum.n, 3);
        assert_eq!(config.quorum.r, 2);
        assert_eq!(config.quorum.w, 2);
        assert_eq!(config.servers.len(), 5);
    }

    #[test]
    fn mesh_port_uses_offset() {
        let config = ClusterConfig::default();
        assert_eq!(config.mesh_port_for(4001), 5001);
        assert_eq!(config.mesh_addr_for(4003), "127.0.0.1:5003");
    }

    #[test]
    fn node_ids_are_port_derived() {
        assert_eq!(ClusterConfig::node_id_for(4001).as_str(), "node-4001");
        let config = ClusterConfig::default();
        assert_eq!(config.port_for(&NodeId::new("node-4002")), Some(4002));
        assert_eq!(config.port_for(&NodeId::new("node-9999")), None);
    }

    #[test]
    fn mismatched_server_count_is_rejected() {
        let config = ClusterConfig {
            num_servers: 3,
            ..ClusterConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn camel_case_keys_parse() {
        let json = r#"{
            "numServers": 2,
            "servers": [4001, 4002],
            "quorum": {"n": 2, "r": 1, "w": 2},
            "coordinator": {"httpPort": 4000, "meshPort": 5000},
            "storage": {"meshPortOffset": 1000}
        }"#;
        let config: ClusterConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.quorum.r, 1);
        assert_eq!(config.replica_timeout_ms, 1000);
        assert_eq!(config.hinted_handoff_flush_secs, 30);
    }

    #[test]
    fn oversized_replication_factor_is_rejected() {
        let config = ClusterConfig {
            num_servers: 2,
            servers: vec![4001, 4002],
            quorum: QuorumParams { n: 3, r: 2, w: 2 },
            ..ClusterConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
