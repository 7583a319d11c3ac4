//! REST surface tests against a single node with no quorum coordinator
//! (local fallback path), in the spirit of running one node standalone.

use basket_cluster::hinted::HintQueue;
use basket_cluster::{api, StorageNode};
use basket_store::LocalStore;
use basket_types::NodeId;
use serde_json::{json, Value};
use std::sync::Arc;

async fn spawn_node() -> String {
    let store = LocalStore::open_in_memory().unwrap();
    let node = Arc::new(
        StorageNode::new(
            NodeId::new("node-4001"),
            store,
            None,
            Arc::new(HintQueue::new()),
            None,
        )
        .unwrap(),
    );
    let app = api::build_router(node);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}

async fn create_list(client: &reqwest::Client, base: &str, name: &str) -> Value {
    let resp = client
        .post(format!("{base}/api/lists"))
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_node_identity() {
    let base = spawn_node().await;
    let body: Value = reqwest::get(format!("{base}/api/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "OK");
    assert_eq!(body["nodeId"], "node-4001");
    assert!(body["timestamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn create_list_returns_201_with_clock() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();

    let list = create_list(&client, &base, "Weekly").await;
    assert_eq!(list["name"], "Weekly");
    assert_eq!(list["vectorClock"]["node-4001"], 1);
    assert!(list["createdAt"].as_u64().is_some());
}

#[tokio::test]
async fn create_list_without_name_is_400() {
    let base = spawn_node().await;
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/lists"))
        .json(&json!({ "name": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn duplicate_create_is_409() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;

    let resp = client
        .post(format!("{base}/api/lists"))
        .json(&json!({ "id": list["id"], "name": "Weekly" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn get_list_embeds_items() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;
    let list_id = list["id"].as_str().unwrap();

    let resp = client
        .post(format!("{base}/api/lists/{list_id}/items"))
        .json(&json!({ "name": "Milk", "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let item: Value = resp.json().await.unwrap();
    assert_eq!(item["quantity"], 3);
    assert_eq!(item["acquired"], 0);
    assert_eq!(item["listId"], list["id"]);

    let body: Value = client
        .get(format!("{base}/api/lists/{list_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], "Weekly");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["name"], "Milk");
}

#[tokio::test]
async fn unknown_list_is_404() {
    let base = spawn_node().await;
    let resp = reqwest::get(format!(
        "{base}/api/lists/00000000-0000-0000-0000-000000000000"
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn malformed_id_is_400() {
    let base = spawn_node().await;
    let resp = reqwest::get(format!("{base}/api/lists/not-a-uuid")).await.unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn adding_item_to_unknown_list_is_404() {
    let base = spawn_node().await;
    let resp = reqwest::Client::new()
        .post(format!(
            "{base}/api/lists/00000000-0000-0000-0000-000000000000/items"
        ))
        .json(&json!({ "name": "Milk" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn toggle_flips_acquired_to_quantity_and_back() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;
    let list_id = list["id"].as_str().unwrap();

    let item: Value = client
        .post(format!("{base}/api/lists/{list_id}/items"))
        .json(&json!({ "name": "Milk", "quantity": 4 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let item_id = item["id"].as_str().unwrap();

    let toggled: Value = client
        .patch(format!("{base}/api/items/{item_id}/toggle"))
        .json(&json!({}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["acquired"], 4, "default toggle checks the item off");

    let toggled: Value = client
        .patch(format!("{base}/api/items/{item_id}/toggle"))
        .json(&json!({ "vectorClock": toggled["vectorClock"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(toggled["acquired"], 0, "second toggle unchecks");
}

#[tokio::test]
async fn quantity_update_rejects_negative() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;
    let list_id = list["id"].as_str().unwrap();
    let item: Value = client
        .post(format!("{base}/api/lists/{list_id}/items"))
        .json(&json!({ "name": "Milk" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let item_id = item["id"].as_str().unwrap();

    let resp = client
        .patch(format!("{base}/api/items/{item_id}/quantity"))
        .json(&json!({ "quantity": -2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn quantity_and_name_updates_apply() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;
    let list_id = list["id"].as_str().unwrap();
    let item: Value = client
        .post(format!("{base}/api/lists/{list_id}/items"))
        .json(&json!({ "name": "Milk", "quantity": 1 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let item_id = item["id"].as_str().unwrap();

    let updated: Value = client
        .patch(format!("{base}/api/items/{item_id}/quantity"))
        .json(&json!({ "quantity": 6, "vectorClock": item["vectorClock"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated["quantity"], 6);

    let renamed: Value = client
        .patch(format!("{base}/api/items/{item_id}/name"))
        .json(&json!({ "name": "Oat Milk", "vectorClock": updated["vectorClock"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(renamed["name"], "Oat Milk");
    assert_eq!(renamed["quantity"], 6);
}

#[tokio::test]
async fn delete_item_then_404() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;
    let list_id = list["id"].as_str().unwrap();
    let item: Value = client
        .post(format!("{base}/api/lists/{list_id}/items"))
        .json(&json!({ "name": "Milk" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let item_id = item["id"].as_str().unwrap();

    let resp = client
        .delete(format!("{base}/api/items/{item_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let resp = client
        .delete(format!("{base}/api/items/{item_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn delete_list_cascades_over_http() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    let list = create_list(&client, &base, "Weekly").await;
    let list_id = list["id"].as_str().unwrap();
    client
        .post(format!("{base}/api/lists/{list_id}/items"))
        .json(&json!({ "name": "Milk" }))
        .send()
        .await
        .unwrap();

    let resp = client
        .delete(format!("{base}/api/lists/{list_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let items: Vec<Value> = client
        .get(format!("{base}/api/items"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(items.is_empty(), "cascade must remove the list's items");

    let resp = client
        .delete(format!("{base}/api/lists/{list_id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn catalogs_list_everything() {
    let base = spawn_node().await;
    let client = reqwest::Client::new();
    create_list(&client, &base, "One").await;
    create_list(&client, &base, "Two").await;

    let lists: Vec<Value> = client
        .get(format!("{base}/api/lists"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(lists.len(), 2);
}
