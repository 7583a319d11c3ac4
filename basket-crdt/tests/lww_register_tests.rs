use basket_crdt::LwwRegister;
use basket_types::{NodeId, Timestamp};

fn node(name: &str) -> NodeId {
    NodeId::new(name)
}

fn ts(millis: u64) -> Timestamp {
    Timestamp::from_millis(millis)
}

#[test]
fn new_register_holds_value() {
    let reg = LwwRegister::new("Milk".to_string(), node("a"));
    assert_eq!(reg.value(), "Milk");
    assert_eq!(reg.writer(), &node("a"));
}

#[test]
fn set_bumps_timestamp() {
    let mut reg = LwwRegister::new("Milk".to_string(), node("a"));
    let before = reg.timestamp();
    reg.set("Soy Milk".to_string(), node("a"));
    assert!(reg.timestamp() > before);
    assert_eq!(reg.value(), "Soy Milk");
}

#[test]
fn later_timestamp_wins_merge() {
    let old = LwwRegister::with_timestamp("Milk".to_string(), ts(100), node("x"));
    let new = LwwRegister::with_timestamp("Soy Milk".to_string(), ts(200), node("y"));

    assert_eq!(old.merged(&new).value(), "Soy Milk");
    assert_eq!(new.merged(&old).value(), "Soy Milk");
}

#[test]
fn earlier_write_never_overwrites() {
    let mut reg = LwwRegister::with_timestamp("current".to_string(), ts(500), node("a"));
    let adopted = reg.set_with_timestamp("stale".to_string(), ts(100), node("b"));
    assert!(!adopted);
    assert_eq!(reg.value(), "current");
}

#[test]
fn timestamp_tie_broken_by_greater_writer() {
    let a = LwwRegister::with_timestamp("from-a".to_string(), ts(100), node("node-a"));
    let b = LwwRegister::with_timestamp("from-b".to_string(), ts(100), node("node-b"));

    // node-b > node-a lexicographically, so b's write wins on both sides
    assert_eq!(a.merged(&b).value(), "from-b");
    assert_eq!(b.merged(&a).value(), "from-b");
}

#[test]
fn merge_is_idempotent() {
    let reg = LwwRegister::with_timestamp(42u32, ts(7), node("a"));
    let merged = reg.merged(&reg);
    assert_eq!(merged.value(), reg.value());
    assert_eq!(merged.timestamp(), reg.timestamp());
}

#[test]
fn merge_is_commutative_and_associative() {
    let a = LwwRegister::with_timestamp("a".to_string(), ts(10), node("na"));
    let b = LwwRegister::with_timestamp("b".to_string(), ts(30), node("nb"));
    let c = LwwRegister::with_timestamp("c".to_string(), ts(20), node("nc"));

    assert_eq!(a.merged(&b).value(), b.merged(&a).value());
    assert_eq!(
        a.merged(&b).merged(&c).value(),
        a.merged(&b.merged(&c)).value()
    );
}

#[test]
fn set_with_equal_timestamp_and_smaller_writer_is_rejected() {
    let mut reg = LwwRegister::with_timestamp("keep".to_string(), ts(100), node("node-z"));
    assert!(!reg.set_with_timestamp("lose".to_string(), ts(100), node("node-a")));
    assert_eq!(reg.value(), "keep");
}

#[test]
fn serialization_roundtrip() {
    let reg = LwwRegister::with_timestamp("Eggs".to_string(), ts(12345), node("node-1"));
    let json = serde_json::to_string(&reg).unwrap();
    let back: LwwRegister<String> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.value(), "Eggs");
    assert_eq!(back.timestamp(), ts(12345));
}
