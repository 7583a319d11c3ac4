//! Sync engine tests against stub storage nodes.

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::any;
use axum::{Json, Router};
use basket_client::{ClientConfig, ClientError, ServerPool, SyncEngine, SyncStatus};
use basket_store::LocalStore;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A programmable fake storage node. Records every request; replies with
/// per-route overrides or sensible defaults (201 on POST, 200 otherwise).
#[derive(Default)]
struct StubNode {
    log: Mutex<Vec<String>>,
    overrides: Mutex<HashMap<String, (u16, Value)>>,
}

impl StubNode {
    fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn set_response(&self, method_and_path: &str, status: u16, body: Value) {
        self.overrides
            .lock()
            .unwrap()
            .insert(method_and_path.to_string(), (status, body));
    }
}

async fn catch_all(
    State(stub): State<Arc<StubNode>>,
    method: Method,
    uri: Uri,
) -> impl IntoResponse {
    let key = format!("{} {}", method, uri.path());
    stub.log.lock().unwrap().push(key.clone());

    if let Some((status, body)) = stub.overrides.lock().unwrap().get(&key) {
        return (StatusCode::from_u16(*status).unwrap(), Json(body.clone()));
    }
    // Defaults: creates succeed, reads of anything unprogrammed miss
    let status = match method {
        Method::POST => StatusCode::CREATED,
        Method::GET => StatusCode::NOT_FOUND,
        _ => StatusCode::OK,
    };
    (status, Json(json!({})))
}

async fn spawn_stub() -> (String, Arc<StubNode>) {
    let stub = Arc::new(StubNode::default());
    let app = Router::new()
        .route("/{*path}", any(catch_all))
        .with_state(Arc::clone(&stub));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://127.0.0.1:{port}"), stub)
}

fn manual_config() -> ClientConfig {
    ClientConfig {
        auto_sync: false,
        ..ClientConfig::default()
    }
}

fn engine_for(servers: Vec<String>) -> Arc<SyncEngine> {
    let store = LocalStore::open_in_memory().unwrap();
    let pool = Arc::new(ServerPool::new(servers, "http://coordinator"));
    SyncEngine::new(store, pool, manual_config()).unwrap()
}

#[tokio::test]
async fn mutations_commit_locally_while_offline() {
    let engine = engine_for(vec!["http://127.0.0.1:1".to_string()]);

    let list = engine.create_list("Weekly").await.unwrap();
    let item = engine.add_item(&list.id, "Milk", 3).await.unwrap();
    engine.toggle(&item.id, None).await.unwrap();
    engine.update_quantity(&item.id, 5).await.unwrap();

    // Everything is visible locally despite the dead server
    assert_eq!(engine.lists().await.len(), 1);
    let local = engine.item(&item.id).await.unwrap();
    assert_eq!(local.quantity, 5);
    assert_eq!(local.acquired, 3);

    assert_eq!(engine.pending_count(), 4);
    assert_eq!(engine.status(), SyncStatus::Queued(4));
}

#[tokio::test]
async fn failed_sync_retains_the_queue() {
    let engine = engine_for(vec!["http://127.0.0.1:1".to_string()]);
    engine.create_list("Weekly").await.unwrap();

    let err = engine.sync_now().await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert_eq!(engine.pending_count(), 1);
    assert_eq!(engine.status(), SyncStatus::Queued(1));
    assert_eq!(engine.pool().failed_count(), 1);
    assert!(engine.last_synced_at().is_none(), "no watermark for a failed pass");
}

#[tokio::test]
async fn server_503_retains_the_queue() {
    let (base, stub) = spawn_stub().await;
    let engine = engine_for(vec![base]);
    let list = engine.create_list("Weekly").await.unwrap();
    stub.set_response("POST /api/lists", 503, json!({"error": "no write quorum"}));

    let err = engine.sync_now().await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status: 503, .. }));
    assert_eq!(engine.pending_count(), 1);
    let _ = list;
}

#[tokio::test]
async fn successful_sync_drains_the_queue() {
    let (base, stub) = spawn_stub().await;
    let engine = engine_for(vec![base]);
    let list = engine.create_list("Weekly").await.unwrap();
    engine.add_item(&list.id, "Milk", 2).await.unwrap();
    assert!(engine.last_synced_at().is_none());

    engine.sync_now().await.unwrap();

    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.status(), SyncStatus::Synced);
    assert!(engine.last_synced_at().is_some(), "watermark advances on success");
    let log = stub.log();
    assert!(log.contains(&"POST /api/lists".to_string()));
    assert!(log.contains(&format!("POST /api/lists/{}/items", list.id)));
}

#[tokio::test]
async fn queue_drains_in_timestamp_order() {
    let (base, stub) = spawn_stub().await;
    let engine = engine_for(vec![base]);
    let list = engine.create_list("Weekly").await.unwrap();
    engine.sync_now().await.unwrap();

    let item = engine.add_item(&list.id, "Milk", 2).await.unwrap();
    engine.toggle(&item.id, Some(1)).await.unwrap();
    engine.update_quantity(&item.id, 7).await.unwrap();
    engine.update_name(&item.id, "Oat Milk").await.unwrap();

    let before = stub.log().len();
    engine.sync_now().await.unwrap();
    let log = stub.log()[before..].to_vec();

    let expected = vec![
        format!("POST /api/lists/{}/items", list.id),
        format!("PATCH /api/items/{}/toggle", item.id),
        format!("PATCH /api/items/{}/quantity", item.id),
        format!("PATCH /api/items/{}/name", item.id),
    ];
    assert_eq!(log, expected, "ops must replay in the order they were made");
}

#[tokio::test]
async fn conflict_on_create_counts_as_success() {
    let (base, stub) = spawn_stub().await;
    let engine = engine_for(vec![base]);
    engine.create_list("Weekly").await.unwrap();
    stub.set_response("POST /api/lists", 409, json!({"error": "exists"}));

    engine.sync_now().await.unwrap();
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.status(), SyncStatus::Synced);
}

#[tokio::test]
async fn not_found_on_delete_counts_as_success() {
    let (base, stub) = spawn_stub().await;
    let engine = engine_for(vec![base]);
    let list = engine.create_list("Weekly").await.unwrap();
    let item = engine.add_item(&list.id, "Milk", 1).await.unwrap();
    engine.sync_now().await.unwrap();

    engine.remove_item(&item.id).await.unwrap();
    stub.set_response(
        &format!("DELETE /api/items/{}", item.id),
        404,
        json!({"error": "not found"}),
    );

    engine.sync_now().await.unwrap();
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test]
async fn empty_pool_fails_fast() {
    let engine = engine_for(vec![]);
    let result = engine.sync_now().await;
    assert!(matches!(result, Err(ClientError::NoServers)));
}

#[tokio::test]
async fn first_sync_pulls_known_lists_back() {
    let (base, stub) = spawn_stub().await;
    let engine = engine_for(vec![base]);
    let list = engine.create_list("Weekly").await.unwrap();

    // The server already holds an item for this list from another client
    let server_item = json!({
        "id": "7f1e0a22-9d3a-4a6d-8a1f-0c9d3b541111",
        "listId": list.id,
        "name": "Eggs",
        "quantity": 12,
        "acquired": 0,
        "createdAt": 1,
        "lastUpdated": 1,
        "vectorClock": {"node-4001": 1}
    });
    let mut server_list = serde_json::to_value(&list).unwrap();
    server_list["items"] = json!([server_item]);
    stub.set_response(&format!("GET /api/lists/{}", list.id), 200, server_list);

    engine.sync_now().await.unwrap();

    let items = engine.items_for(&list.id).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "Eggs");
    assert_eq!(items[0].quantity, 12);
}

#[tokio::test]
async fn pending_ops_survive_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.db");

    let list_id = {
        let store = LocalStore::open(&path).unwrap();
        let pool = Arc::new(ServerPool::new(
            vec!["http://127.0.0.1:1".to_string()],
            "http://coordinator",
        ));
        let engine = SyncEngine::new(store, pool, manual_config()).unwrap();
        let list = engine.create_list("Weekly").await.unwrap();
        engine.add_item(&list.id, "Milk", 2).await.unwrap();
        assert!(engine.sync_now().await.is_err());
        list.id
    };

    // Next session: same store, reachable cluster
    let (base, stub) = spawn_stub().await;
    let store = LocalStore::open(&path).unwrap();
    let pool = Arc::new(ServerPool::new(vec![base], "http://coordinator"));
    let engine = SyncEngine::new(store, pool, manual_config()).unwrap();

    assert_eq!(engine.pending_count(), 2, "queue survives the crash");
    engine.sync_now().await.unwrap();
    assert_eq!(engine.pending_count(), 0);

    let log = stub.log();
    assert!(log.contains(&"POST /api/lists".to_string()));
    assert!(log.contains(&format!("POST /api/lists/{list_id}/items")));
}

#[tokio::test]
async fn node_identity_is_stable_across_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.db");

    let first = {
        let store = LocalStore::open(&path).unwrap();
        let engine = SyncEngine::new(
            store,
            Arc::new(ServerPool::new(vec![], "http://c")),
            manual_config(),
        )
        .unwrap();
        let list = engine.create_list("Weekly").await.unwrap();
        list.vector_clock
    };

    let store = LocalStore::open(&path).unwrap();
    let engine = SyncEngine::new(
        store,
        Arc::new(ServerPool::new(vec![], "http://c")),
        manual_config(),
    )
    .unwrap();
    let list = engine.create_list("Another").await.unwrap();

    // Both lists were stamped by the same persisted client identity
    let first_writer: Vec<_> = first.entries().map(|(n, _)| n.clone()).collect();
    let second_writer: Vec<_> = list.vector_clock.entries().map(|(n, _)| n.clone()).collect();
    assert_eq!(first_writer, second_writer);
}
