//! Request/reply channel tests, including the Lazy-Pirate teardown-and-retry
//! contract.

use async_trait::async_trait;
use basket_cluster::channel::PeerChannel;
use basket_cluster::mesh::{self, MeshHandler};
use basket_cluster::protocol::{DataType, NodeMessage, NodeReply};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Replies ok to everything and counts requests.
struct CountingHandler {
    seen: AtomicUsize,
}

#[async_trait]
impl MeshHandler for CountingHandler {
    async fn handle(&self, _message: NodeMessage) -> NodeReply {
        self.seen.fetch_add(1, Ordering::SeqCst);
        NodeReply::ok_with(serde_json::json!({"echo": true}))
    }
}

async fn spawn_listener(port: Option<u16>) -> (u16, Arc<CountingHandler>, JoinHandle<()>) {
    let listener = TcpListener::bind(("127.0.0.1", port.unwrap_or(0))).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handler = Arc::new(CountingHandler {
        seen: AtomicUsize::new(0),
    });
    let serving = Arc::clone(&handler);
    let task = tokio::spawn(async move {
        let _ = mesh::serve(listener, serving).await;
    });
    (port, handler, task)
}

fn read_message() -> NodeMessage {
    NodeMessage::Read {
        key: "k".into(),
        data_type: DataType::Item,
    }
}

#[tokio::test]
async fn request_reply_roundtrip() {
    let (port, handler, _task) = spawn_listener(None).await;
    let channel = PeerChannel::new(format!("127.0.0.1:{port}"));

    let reply = channel
        .request(&read_message(), Duration::from_secs(1))
        .await
        .unwrap();

    assert!(reply.is_ok());
    assert_eq!(reply.data.unwrap()["echo"], true);
    assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sequential_requests_reuse_the_connection() {
    let (port, handler, _task) = spawn_listener(None).await;
    let channel = PeerChannel::new(format!("127.0.0.1:{port}"));

    for _ in 0..5 {
        let reply = channel
            .request(&read_message(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(reply.is_ok());
    }
    assert_eq!(handler.seen.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn concurrent_callers_serialize_on_the_channel() {
    let (port, handler, _task) = spawn_listener(None).await;
    let channel = Arc::new(PeerChannel::new(format!("127.0.0.1:{port}")));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let channel = Arc::clone(&channel);
        tasks.push(tokio::spawn(async move {
            channel.request(&read_message(), Duration::from_secs(2)).await
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().unwrap().is_ok());
    }
    assert_eq!(handler.seen.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn unreachable_peer_times_out_after_retries() {
    // Nothing listens on port 1
    let channel = PeerChannel::new("127.0.0.1:1");
    let started = std::time::Instant::now();
    let result = channel.request(&read_message(), Duration::from_millis(100)).await;

    assert!(result.is_err());
    // Three attempts, none hanging forever
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn reconnects_after_peer_restart() {
    let (port, _handler, task) = spawn_listener(None).await;
    let channel = PeerChannel::new(format!("127.0.0.1:{port}"));

    let reply = channel
        .request(&read_message(), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(reply.is_ok());

    // Kill the listener; the held socket goes stale
    task.abort();
    let _ = task.await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Restart on the same port; Lazy Pirate teardown must reconnect
    let (_, handler, _task) = spawn_listener(Some(port)).await;
    let reply = channel
        .request(&read_message(), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(reply.is_ok());
    assert_eq!(handler.seen.load(Ordering::SeqCst), 1);
}
