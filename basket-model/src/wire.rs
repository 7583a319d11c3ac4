//! Plain-value wire records and request bodies.
//!
//! These shapes are shared verbatim by the HTTP surface, the replication
//! mesh, and the persisted layout. Field names follow the JSON surface
//! (camelCase). Optional fields mean "no assertion", never "set to null".

use basket_crdt::VectorClock;
use basket_types::{ItemId, ListId, Timestamp};
use serde::{Deserialize, Serialize};

/// The visible state of a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecord {
    pub id: ListId,
    pub name: String,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
    #[serde(default)]
    pub vector_clock: VectorClock,
}

/// The visible state of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: ItemId,
    pub list_id: ListId,
    pub name: String,
    pub quantity: i64,
    pub acquired: i64,
    pub created_at: Timestamp,
    pub last_updated: Timestamp,
    #[serde(default)]
    pub vector_clock: VectorClock,
}

/// Body of `POST /api/lists`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateListBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ListId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_clock: Option<VectorClock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

/// Body of `POST /api/lists/:id/items`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateItemBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_clock: Option<VectorClock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

/// Body of `PATCH /api/items/:id/toggle`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_clock: Option<VectorClock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

/// Body of `PATCH /api/items/:id/quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityBody {
    pub quantity: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acquired: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_clock: Option<VectorClock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}

/// Body of `PATCH /api/items/:id/name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NameBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vector_clock: Option<VectorClock>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<Timestamp>,
}
