//! Replication-mesh message envelopes.
//!
//! Every inter-node exchange is a single JSON request followed by a single
//! JSON reply. Write envelopes carry full plain-value records (with their
//! vector clocks); receivers feed them through the same clock-aware apply
//! logic as client writes.

use basket_model::{ItemRecord, ListRecord};
use basket_types::{ItemId, ListId};
use serde::{Deserialize, Serialize};

/// What a READ request is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    List,
    Item,
}

/// A request sent between nodes (or from a node to the coordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeMessage {
    #[serde(rename = "READ", rename_all = "camelCase")]
    Read { key: String, data_type: DataType },

    #[serde(rename = "CREATE_LIST")]
    CreateList { list: ListRecord },

    #[serde(rename = "DELETE_LIST", rename_all = "camelCase")]
    DeleteList { list_id: ListId },

    #[serde(rename = "ADD_ITEM")]
    AddItem { item: ItemRecord },

    #[serde(rename = "UPDATE_ITEM")]
    UpdateItem { item: ItemRecord },

    #[serde(rename = "UPDATE_QUANTITY")]
    UpdateQuantity { item: ItemRecord },

    #[serde(rename = "UPDATE_NAME")]
    UpdateName { item: ItemRecord },

    #[serde(rename = "TOGGLE_CHECK")]
    ToggleCheck { item: ItemRecord },

    #[serde(rename = "REMOVE_ITEM", rename_all = "camelCase")]
    RemoveItem { item_id: ItemId },

    #[serde(rename = "BROADCAST")]
    Broadcast {
        event: String,
        data: serde_json::Value,
    },
}

impl NodeMessage {
    /// The entity key this message routes on, if any.
    #[must_use]
    pub fn routing_key(&self) -> Option<String> {
        match self {
            Self::Read { key, .. } => Some(key.clone()),
            Self::CreateList { list } => Some(list.id.to_string()),
            Self::DeleteList { list_id } => Some(list_id.to_string()),
            Self::AddItem { item }
            | Self::UpdateItem { item }
            | Self::UpdateQuantity { item }
            | Self::UpdateName { item }
            | Self::ToggleCheck { item } => Some(item.id.to_string()),
            Self::RemoveItem { item_id } => Some(item_id.to_string()),
            Self::Broadcast { .. } => None,
        }
    }
}

/// The reply to a [`NodeMessage`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReply {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Reply outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

impl NodeReply {
    /// A bare success.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            status: ReplyStatus::Ok,
            data: None,
            error: None,
        }
    }

    /// A success carrying a payload. `Value::Null` means "nothing held".
    #[must_use]
    pub fn ok_with(data: serde_json::Value) -> Self {
        Self {
            status: ReplyStatus::Ok,
            data: Some(data),
            error: None,
        }
    }

    /// A failure with a reason.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Returns true if the reply is a success.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }
}
