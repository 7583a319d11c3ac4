use basket_cluster::ring::HashRing;
use basket_types::NodeId;

fn nodes(names: &[&str]) -> Vec<NodeId> {
    names.iter().map(|n| NodeId::new(*n)).collect()
}

#[test]
fn preference_list_wraps_around_the_ring() {
    let ring = HashRing::new(nodes(&["node-4001", "node-4002", "node-4003"]));
    // Every key must get all three nodes when N equals the ring size
    for i in 0..50 {
        let prefs = ring.preference_list(&format!("key-{i}"), 3);
        assert_eq!(prefs.len(), 3);
    }
}

#[test]
fn same_key_same_replicas() {
    let ring = HashRing::new(nodes(&["node-4001", "node-4002", "node-4003", "node-4004"]));
    let a = ring.preference_list("shopping-list-42", 3);
    let b = ring.preference_list("shopping-list-42", 3);
    assert_eq!(a, b);
}

#[test]
fn adding_a_node_moves_a_bounded_share_of_keys() {
    let three = HashRing::new(nodes(&["node-4001", "node-4002", "node-4003"]));
    let four = HashRing::new(nodes(&["node-4001", "node-4002", "node-4003", "node-4004"]));

    let total = 2000;
    let mut moved = 0;
    for i in 0..total {
        let key = format!("key-{i}");
        if three.primary(&key) != four.primary(&key) {
            moved += 1;
        }
    }

    // Consistent hashing: growing 3 -> 4 must reassign at most half of a
    // large key population (the expectation is ~1/4)
    assert!(
        moved * 2 <= total,
        "moved {moved} of {total} keys, expected at most 50%"
    );
    assert!(moved > 0, "a new node must take over some keys");
}

#[test]
fn removing_a_node_only_reassigns_its_keys() {
    let full = HashRing::new(nodes(&["node-4001", "node-4002", "node-4003", "node-4004"]));
    let reduced = HashRing::new(nodes(&["node-4001", "node-4002", "node-4003"]));

    for i in 0..500 {
        let key = format!("key-{i}");
        let before = full.primary(&key).unwrap();
        let after = reduced.primary(&key).unwrap();
        if before.as_str() != "node-4004" {
            assert_eq!(before, after, "key {key} moved although its node survived");
        }
    }
}

#[test]
fn duplicate_nodes_collapse() {
    let ring = HashRing::new(nodes(&["node-4001", "node-4001", "node-4002"]));
    assert_eq!(ring.len(), 2);
}
