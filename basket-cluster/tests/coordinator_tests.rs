//! Coordinator fan-out tests: mesh intake, bus delivery, SSE framing.

use basket_cluster::channel::PeerChannel;
use basket_cluster::coordinator::{build_router, Coordinator};
use basket_cluster::mesh;
use basket_cluster::protocol::{DataType, NodeMessage};
use basket_crdt::VectorClock;
use basket_model::{ChangeEvent, ItemRecord};
use basket_types::{ItemId, ListId, Timestamp};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

fn item_record() -> ItemRecord {
    ItemRecord {
        id: ItemId::new(),
        list_id: ListId::new(),
        name: "Milk".into(),
        quantity: 2,
        acquired: 0,
        created_at: Timestamp::from_millis(1),
        last_updated: Timestamp::from_millis(1),
        vector_clock: VectorClock::new(),
    }
}

#[tokio::test]
async fn publish_reaches_every_subscriber() {
    let coordinator = Coordinator::new();
    let mut first = coordinator.subscribe();
    let mut second = coordinator.subscribe();

    let event = ChangeEvent::ItemAdded(item_record());
    assert_eq!(coordinator.publish(event.clone()), 2);

    assert_eq!(first.recv().await.unwrap(), event);
    assert_eq!(second.recv().await.unwrap(), event);
}

#[tokio::test]
async fn broadcast_envelope_is_accepted_over_the_mesh() {
    let coordinator = Arc::new(Coordinator::new());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let serving = Arc::clone(&coordinator);
    tokio::spawn(async move {
        let _ = mesh::serve(listener, serving).await;
    });

    let mut subscriber = coordinator.subscribe();
    let event = ChangeEvent::ItemAdded(item_record());

    let channel = PeerChannel::new(format!("127.0.0.1:{port}"));
    let reply = channel
        .request(
            &NodeMessage::Broadcast {
                event: event.name().to_string(),
                data: event.data_json(),
            },
            Duration::from_secs(1),
        )
        .await
        .unwrap();

    assert!(reply.is_ok());
    assert_eq!(subscriber.recv().await.unwrap(), event);
}

#[tokio::test]
async fn non_broadcast_messages_are_rejected() {
    let coordinator = Coordinator::new();
    let reply = mesh::MeshHandler::handle(
        &coordinator,
        NodeMessage::Read {
            key: "k".into(),
            data_type: DataType::Item,
        },
    )
    .await;
    assert!(!reply.is_ok());
}

#[tokio::test]
async fn unknown_event_names_are_rejected() {
    let coordinator = Coordinator::new();
    let reply = mesh::MeshHandler::handle(
        &coordinator,
        NodeMessage::Broadcast {
            event: "item-exploded".into(),
            data: serde_json::json!({}),
        },
    )
    .await;
    assert!(!reply.is_ok());
}

#[tokio::test]
async fn sse_stream_carries_named_events() {
    let coordinator = Arc::new(Coordinator::new());
    let app = build_router(Arc::clone(&coordinator));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let resp = reqwest::get(format!("http://127.0.0.1:{port}/api/events"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("text/event-stream"));

    // Give the subscription a moment to register before publishing
    tokio::time::sleep(Duration::from_millis(100)).await;
    let record = item_record();
    coordinator.publish(ChangeEvent::ItemQuantityUpdated(record.clone()));

    let mut stream = resp.bytes_stream();
    let mut collected = String::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_secs(1), stream.next()).await {
            Ok(Some(Ok(chunk))) => {
                collected.push_str(&String::from_utf8_lossy(&chunk));
                if collected.contains("\n\n") {
                    break;
                }
            }
            _ => break,
        }
    }

    assert!(
        collected.contains("event: item-quantity-updated"),
        "got: {collected}"
    );
    assert!(collected.contains(&record.id.to_string()));
}

#[tokio::test]
async fn coordinator_health_endpoint() {
    let coordinator = Arc::new(Coordinator::new());
    let app = build_router(coordinator);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let body: serde_json::Value = reqwest::get(format!("http://127.0.0.1:{port}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "OK");
}
