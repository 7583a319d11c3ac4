//! Streaming consumer for the coordinator's server-sent events.
//!
//! Maintains one long-lived connection to the coordinator (never to a
//! storage node), parses the event-stream framing, and hands each decoded
//! change to the engine. A periodic health probe catches silently dead
//! connections; any failure tears the stream down and reconnects after its
//! own delay.

use crate::engine::SyncEngine;
use crate::error::{ClientError, ClientResult};
use basket_model::ChangeEvent;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Interval between connection health probes.
pub const DEFAULT_SSE_PROBE: Duration = Duration::from_secs(5);

/// Delay before reconnecting a failed stream.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Parses one event-stream block (the lines between two blank lines) into
/// `(event name, data)`. Comment lines (heartbeats) yield no event.
#[must_use]
pub fn parse_event_block(block: &str) -> Option<(String, String)> {
    let mut event = None;
    let mut data = String::new();
    for line in block.lines() {
        if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // Lines starting with ':' are comments (keep-alives), skipped
    }
    event.map(|event| (event, data))
}

/// Spawns the long-running consumer task.
pub fn spawn_event_consumer(
    engine: Arc<SyncEngine>,
    probe_interval: Duration,
    reconnect_delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let http = reqwest::Client::new();
        let base = engine.pool().coordinator_url().to_string();
        loop {
            match consume_stream(&engine, &http, &base, probe_interval).await {
                Ok(()) => debug!("event stream closed by coordinator"),
                Err(e) => debug!(error = %e, "event stream failed"),
            }
            tokio::time::sleep(reconnect_delay).await;
        }
    })
}

async fn consume_stream(
    engine: &Arc<SyncEngine>,
    http: &reqwest::Client,
    base: &str,
    probe_interval: Duration,
) -> ClientResult<()> {
    let resp = http
        .get(format!("{base}/api/events"))
        .send()
        .await?
        .error_for_status()?;
    info!(coordinator = base, "event stream connected");

    let mut stream = resp.bytes_stream();
    let mut buffer = String::new();
    let mut probe = tokio::time::interval(probe_interval);
    probe.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    probe.tick().await;

    loop {
        tokio::select! {
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        drain_blocks(engine, &mut buffer).await;
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }
            _ = probe.tick() => {
                let healthy = http
                    .get(format!("{base}/api/health"))
                    .timeout(Duration::from_secs(2))
                    .send()
                    .await
                    .map(|resp| resp.status().is_success())
                    .unwrap_or(false);
                if !healthy {
                    return Err(ClientError::Rejected {
                        status: 503,
                        detail: "coordinator health probe failed".into(),
                    });
                }
            }
        }
    }
}

/// Consumes every complete block in the buffer, applying decoded events.
async fn drain_blocks(engine: &Arc<SyncEngine>, buffer: &mut String) {
    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer[..pos].to_string();
        buffer.drain(..pos + 2);

        let Some((name, data)) = parse_event_block(&block) else {
            continue;
        };
        let Ok(value) = serde_json::from_str(&data) else {
            debug!(event = name, "undecodable event payload");
            continue;
        };
        let Some(event) = ChangeEvent::from_wire(&name, value) else {
            debug!(event = name, "unknown event name");
            continue;
        };
        if let Err(e) = engine.apply_event(event).await {
            debug!(error = %e, "event apply failed");
        }
    }
}
