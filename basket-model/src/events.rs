//! Typed change events fanned out to subscribed clients.
//!
//! Every successful state change on a storage node becomes one of these,
//! forwarded to the coordinator and multicast as a named server-sent event.
//! Payloads carry full records (with vector clocks) so receivers can apply
//! the same causality checks as the write path.

use crate::wire::{ItemRecord, ListRecord};
use basket_types::{ItemId, ListId};
use serde::{Deserialize, Serialize};

/// Payload of a `list-deleted` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedList {
    pub id: ListId,
}

/// Payload of an `item-removed` event. Carries the list id so clients can
/// apply their known-list filter without a lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedItem {
    pub id: ItemId,
    pub list_id: ListId,
}

/// A state change, named the way the SSE surface names it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ChangeEvent {
    ListCreated(ListRecord),
    ListDeleted(DeletedList),
    ItemAdded(ItemRecord),
    ItemRemoved(RemovedItem),
    ItemToggled(ItemRecord),
    ItemNameUpdated(ItemRecord),
    ItemQuantityUpdated(ItemRecord),
    ItemUpdated(ItemRecord),
}

impl ChangeEvent {
    /// Returns the SSE event name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ListCreated(_) => "list-created",
            Self::ListDeleted(_) => "list-deleted",
            Self::ItemAdded(_) => "item-added",
            Self::ItemRemoved(_) => "item-removed",
            Self::ItemToggled(_) => "item-toggled",
            Self::ItemNameUpdated(_) => "item-name-updated",
            Self::ItemQuantityUpdated(_) => "item-quantity-updated",
            Self::ItemUpdated(_) => "item-updated",
        }
    }

    /// Serializes the payload (without the event name envelope).
    #[must_use]
    pub fn data_json(&self) -> serde_json::Value {
        match self {
            Self::ListCreated(r) => serde_json::to_value(r),
            Self::ListDeleted(r) => serde_json::to_value(r),
            Self::ItemAdded(r)
            | Self::ItemToggled(r)
            | Self::ItemNameUpdated(r)
            | Self::ItemQuantityUpdated(r)
            | Self::ItemUpdated(r) => serde_json::to_value(r),
            Self::ItemRemoved(r) => serde_json::to_value(r),
        }
        .expect("change event payloads are plain records")
    }

    /// Rebuilds an event from its SSE name and payload.
    pub fn from_wire(name: &str, data: serde_json::Value) -> Option<Self> {
        let event = match name {
            "list-created" => Self::ListCreated(serde_json::from_value(data).ok()?),
            "list-deleted" => Self::ListDeleted(serde_json::from_value(data).ok()?),
            "item-added" => Self::ItemAdded(serde_json::from_value(data).ok()?),
            "item-removed" => Self::ItemRemoved(serde_json::from_value(data).ok()?),
            "item-toggled" => Self::ItemToggled(serde_json::from_value(data).ok()?),
            "item-name-updated" => Self::ItemNameUpdated(serde_json::from_value(data).ok()?),
            "item-quantity-updated" => {
                Self::ItemQuantityUpdated(serde_json::from_value(data).ok()?)
            }
            "item-updated" => Self::ItemUpdated(serde_json::from_value(data).ok()?),
            _ => return None,
        };
        Some(event)
    }

    /// The list a subscriber needs to know for this event to be relevant.
    #[must_use]
    pub fn list_id(&self) -> ListId {
        match self {
            Self::ListCreated(r) => r.id,
            Self::ListDeleted(r) => r.id,
            Self::ItemRemoved(r) => r.list_id,
            Self::ItemAdded(r)
            | Self::ItemToggled(r)
            | Self::ItemNameUpdated(r)
            | Self::ItemQuantityUpdated(r)
            | Self::ItemUpdated(r) => r.list_id,
        }
    }
}
