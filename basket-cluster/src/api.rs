//! REST surface of a storage node.

use crate::error::{ClusterError, ClusterResult};
use crate::node::StorageNode;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use basket_model::{
    CreateItemBody, CreateListBody, ItemRecord, ListRecord, NameBody, QuantityBody, ToggleBody,
};
use basket_types::{ItemId, ListId, Timestamp};
use std::sync::Arc;

/// Builds the node's HTTP router.
pub fn build_router(node: Arc<StorageNode>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/lists", axum::routing::post(create_list).get(all_lists))
        .route("/api/lists/{id}", get(get_list).delete(delete_list))
        .route("/api/lists/{id}/items", axum::routing::post(add_item))
        .route("/api/items", get(all_items))
        .route("/api/items/{id}", axum::routing::delete(remove_item))
        .route("/api/items/{id}/toggle", patch(toggle_item))
        .route("/api/items/{id}/quantity", patch(update_quantity))
        .route("/api/items/{id}/name", patch(update_name))
        .with_state(node)
}

fn parse_list_id(raw: &str) -> ClusterResult<ListId> {
    ListId::parse(raw).map_err(|_| ClusterError::BadRequest(format!("invalid list id: {raw}")))
}

fn parse_item_id(raw: &str) -> ClusterResult<ItemId> {
    ItemId::parse(raw).map_err(|_| ClusterError::BadRequest(format!("invalid item id: {raw}")))
}

async fn health(State(node): State<Arc<StorageNode>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "nodeId": node.node_id(),
        "timestamp": Timestamp::now(),
    }))
}

async fn create_list(
    State(node): State<Arc<StorageNode>>,
    Json(body): Json<CreateListBody>,
) -> ClusterResult<(StatusCode, Json<ListRecord>)> {
    let record = node.create_list(body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn all_lists(State(node): State<Arc<StorageNode>>) -> Json<Vec<ListRecord>> {
    Json(node.list_catalog().await)
}

async fn get_list(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
) -> ClusterResult<Json<serde_json::Value>> {
    let id = parse_list_id(&id)?;
    let (list, items) = node.get_list_with_items(id).await?;
    let mut value = serde_json::to_value(&list)?;
    value["items"] = serde_json::to_value(&items)?;
    Ok(Json(value))
}

async fn delete_list(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
) -> ClusterResult<Json<serde_json::Value>> {
    let id = parse_list_id(&id)?;
    node.delete_list(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn add_item(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
    Json(body): Json<CreateItemBody>,
) -> ClusterResult<(StatusCode, Json<ItemRecord>)> {
    let list_id = parse_list_id(&id)?;
    let record = node.add_item(list_id, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn all_items(State(node): State<Arc<StorageNode>>) -> Json<Vec<ItemRecord>> {
    Json(node.item_catalog().await)
}

async fn remove_item(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
) -> ClusterResult<Json<serde_json::Value>> {
    let id = parse_item_id(&id)?;
    node.remove_item(id).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

async fn toggle_item(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
    Json(body): Json<ToggleBody>,
) -> ClusterResult<Json<ItemRecord>> {
    let id = parse_item_id(&id)?;
    Ok(Json(node.toggle_item(id, body).await?))
}

async fn update_quantity(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
    Json(body): Json<QuantityBody>,
) -> ClusterResult<Json<ItemRecord>> {
    let id = parse_item_id(&id)?;
    Ok(Json(node.update_quantity(id, body).await?))
}

async fn update_name(
    State(node): State<Arc<StorageNode>>,
    Path(id): Path<String>,
    Json(body): Json<NameBody>,
) -> ClusterResult<Json<ItemRecord>> {
    let id = parse_item_id(&id)?;
    Ok(Json(node.update_name(id, body).await?))
}
