use basket_types::{ItemId, ListId, NodeId};
use std::str::FromStr;

#[test]
fn list_ids_are_unique() {
    let a = ListId::new();
    let b = ListId::new();
    assert_ne!(a, b);
}

#[test]
fn list_id_roundtrips_through_string() {
    let id = ListId::new();
    let parsed = ListId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn list_id_rejects_garbage() {
    assert!(ListId::parse("not-a-uuid").is_err());
}

#[test]
fn item_id_from_str() {
    let id = ItemId::new();
    let parsed = ItemId::from_str(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn item_id_serializes_as_bare_string() {
    let id = ItemId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
}

#[test]
fn node_id_preserves_name() {
    let id = NodeId::new("node-4001");
    assert_eq!(id.as_str(), "node-4001");
    assert_eq!(id.to_string(), "node-4001");
}

#[test]
fn node_id_orders_lexicographically() {
    let a = NodeId::new("node-a");
    let b = NodeId::new("node-b");
    assert!(a < b);
}

#[test]
fn random_node_ids_differ() {
    assert_ne!(NodeId::random(), NodeId::random());
}

#[test]
fn node_id_serializes_transparently() {
    let id = NodeId::new("node-9");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"node-9\"");
    let back: NodeId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}
