//! Basket storage node.
//!
//! Serves the client REST API on its HTTP port, participates in the
//! replication mesh on its mesh port, and forwards successful changes to
//! the cluster coordinator for SSE fan-out.
//!
//! Usage:
//!   basket-node --port 4001 [--config cluster.json] [--data-dir ./data]

use anyhow::{bail, Context, Result};
use basket_cluster::channel::PeerChannel;
use basket_cluster::hinted::{spawn_flusher, HintQueue};
use basket_cluster::protocol::NodeMessage;
use basket_cluster::quorum::QuorumCoordinator;
use basket_cluster::ring::HashRing;
use basket_cluster::{api, mesh, ClusterConfig, StorageNode};
use basket_model::ChangeEvent;
use basket_store::{LocalStore, META_NODE_ID};
use basket_types::NodeId;
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "basket-node")]
#[command(about = "Basket storage node")]
struct Args {
    /// HTTP port of this node; must appear in the cluster config
    #[arg(short, long)]
    port: u16,

    /// Path to the cluster configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for the node's durable store
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = match &args.config {
        Some(path) => ClusterConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ClusterConfig::default(),
    };
    if !config.servers.contains(&args.port) {
        bail!("port {} is not in the cluster config", args.port);
    }

    let node_id = ClusterConfig::node_id_for(args.port);
    info!(
        node = %node_id,
        http = args.port,
        mesh = config.mesh_port_for(args.port),
        n = config.quorum.n,
        r = config.quorum.r,
        w = config.quorum.w,
        "basket node starting"
    );

    std::fs::create_dir_all(&args.data_dir).context("failed to create data dir")?;
    let store = LocalStore::open(args.data_dir.join(format!("{node_id}.db")))
        .context("failed to open store")?;
    store.set_meta(META_NODE_ID, node_id.as_str())?;

    // Channels to every other node's mesh endpoint
    let peers: HashMap<NodeId, Arc<PeerChannel>> = config
        .servers
        .iter()
        .filter(|&&port| port != args.port)
        .map(|&port| {
            (
                ClusterConfig::node_id_for(port),
                Arc::new(PeerChannel::new(config.mesh_addr_for(port))),
            )
        })
        .collect();

    let ring = HashRing::new(config.node_ids());
    let quorum = QuorumCoordinator::new(
        node_id.clone(),
        config.quorum,
        ring,
        peers.clone(),
        config.replica_timeout(),
    );

    // Ordered forwarder from the node to the coordinator's mesh endpoint
    let coordinator_channel = Arc::new(PeerChannel::new(config.coordinator_mesh_addr()));
    let (broadcast_tx, mut broadcast_rx) = mpsc::unbounded_channel::<ChangeEvent>();
    let replica_timeout = config.replica_timeout();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = broadcast_rx.recv().await {
            let message = NodeMessage::Broadcast {
                event: event.name().to_string(),
                data: event.data_json(),
            };
            if let Err(e) = coordinator_channel.request(&message, replica_timeout).await {
                warn!(error = %e, "coordinator unreachable, event dropped");
            }
        }
    });

    let hints = Arc::new(HintQueue::new());
    let node = Arc::new(StorageNode::new(
        node_id,
        store,
        Some(quorum),
        Arc::clone(&hints),
        Some(broadcast_tx),
    )?);

    let mesh_listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.mesh_port_for(args.port)))
            .await
            .context("failed to bind mesh port")?;
    let mesh_task = {
        let node = Arc::clone(&node);
        tokio::spawn(async move {
            if let Err(e) = mesh::serve(mesh_listener, node).await {
                warn!(error = %e, "mesh listener stopped");
            }
        })
    };

    let flusher = spawn_flusher(
        Arc::clone(&hints),
        peers,
        config.handoff_flush_interval(),
        config.replica_timeout(),
    );

    let http_listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .context("failed to bind HTTP port")?;
    info!(port = args.port, "HTTP API listening");

    let app = api::build_router(node);
    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    // Listener loops stop first; the store closes when the node drops
    mesh_task.abort();
    flusher.abort();
    forwarder.abort();
    info!("basket node stopped");
    Ok(())
}
