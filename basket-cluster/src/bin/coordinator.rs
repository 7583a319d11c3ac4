//! Basket cluster coordinator.
//!
//! Receives BROADCAST envelopes from storage nodes over the mesh and fans
//! them out to subscribed clients as server-sent events.
//!
//! Usage:
//!   basket-coordinator [--config cluster.json]

use anyhow::{Context, Result};
use basket_cluster::coordinator::{build_router, Coordinator};
use basket_cluster::{mesh, ClusterConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "basket-coordinator")]
#[command(about = "Basket SSE fan-out coordinator")]
struct Args {
    /// Path to the cluster configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

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

    let coordinator = Arc::new(Coordinator::new());
    info!(
        http = config.coordinator.http_port,
        mesh = config.coordinator.mesh_port,
        "coordinator starting"
    );

    let mesh_listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.coordinator.mesh_port))
            .await
            .context("failed to bind mesh port")?;
    let mesh_task = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = mesh::serve(mesh_listener, coordinator).await {
                warn!(error = %e, "mesh listener stopped");
            }
        })
    };

    let http_listener =
        tokio::net::TcpListener::bind(("0.0.0.0", config.coordinator.http_port))
            .await
            .context("failed to bind HTTP port")?;
    info!(port = config.coordinator.http_port, "SSE endpoint listening");

    let app = build_router(coordinator);
    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("HTTP server failed")?;

    mesh_task.abort();
    info!("coordinator stopped");
    Ok(())
}
