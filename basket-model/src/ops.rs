//! Pending operations — the client's durable outbound queue entries.

use basket_types::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of a queued (or replicated) mutation.
///
/// Wire names are SCREAMING_SNAKE_CASE to match the operation names the
/// replication mesh uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpKind {
    CreateList,
    DeleteList,
    AddItem,
    UpdateName,
    UpdateQuantity,
    ToggleCheck,
    RemoveItem,
}

impl OpKind {
    /// Returns the wire name of the operation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateList => "CREATE_LIST",
            Self::DeleteList => "DELETE_LIST",
            Self::AddItem => "ADD_ITEM",
            Self::UpdateName => "UPDATE_NAME",
            Self::UpdateQuantity => "UPDATE_QUANTITY",
            Self::ToggleCheck => "TOGGLE_CHECK",
            Self::RemoveItem => "REMOVE_ITEM",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE_LIST" => Some(Self::CreateList),
            "DELETE_LIST" => Some(Self::DeleteList),
            "ADD_ITEM" => Some(Self::AddItem),
            "UPDATE_NAME" => Some(Self::UpdateName),
            "UPDATE_QUANTITY" => Some(Self::UpdateQuantity),
            "TOGGLE_CHECK" => Some(Self::ToggleCheck),
            "REMOVE_ITEM" => Some(Self::RemoveItem),
            _ => None,
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued mutation awaiting acknowledgment from the cluster.
///
/// `data` is the payload the target endpoint needs (entity ids, target
/// values, the client's clock). `synced` flips when the server acknowledges;
/// the row is deleted later by the cleanup step, so a crash in between only
/// costs a harmless replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOp {
    pub id: i64,
    pub kind: OpKind,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
    pub synced: bool,
}
