//! Property-based tests for CRDT correctness.
//!
//! Verifies the merge laws every CRDT in the crate must satisfy:
//! - Commutativity: merge(A, B) == merge(B, A)
//! - Associativity: merge(merge(A, B), C) == merge(A, merge(B, C))
//! - Idempotence: merge(A, A) == A
//!
//! plus the 4-way exclusivity of vector clock comparison.

use basket_crdt::{CausalOrder, LwwRegister, PnCounter, VectorClock};
use basket_types::{NodeId, Timestamp};
use proptest::prelude::*;

const NODES: &[&str] = &["node-a", "node-b", "node-c", "node-d"];

fn node_strategy() -> impl Strategy<Value = NodeId> {
    prop::sample::select(NODES).prop_map(NodeId::new)
}

fn clock_strategy() -> impl Strategy<Value = VectorClock> {
    prop::collection::vec((prop::sample::select(NODES), 0u64..50), 0..4).prop_map(|entries| {
        let mut clock = VectorClock::new();
        for (name, time) in entries {
            clock.update(&NodeId::new(name), time);
        }
        clock
    })
}

fn counter_strategy() -> impl Strategy<Value = PnCounter> {
    prop::collection::vec((prop::sample::select(NODES), 0u64..100, 0u64..100), 0..4).prop_map(
        |entries| {
            let mut counter = PnCounter::new();
            for (name, incs, decs) in entries {
                let id = NodeId::new(name);
                counter.increment(&id, incs);
                counter.decrement(&id, decs);
            }
            counter
        },
    )
}

fn register_strategy() -> impl Strategy<Value = LwwRegister<String>> {
    ("[a-z]{0,12}", 1u64..1_000_000, node_strategy())
        .prop_map(|(value, millis, writer)| {
            LwwRegister::with_timestamp(value, Timestamp::from_millis(millis), writer)
        })
}

proptest! {
    #[test]
    fn clock_merge_commutative(a in clock_strategy(), b in clock_strategy()) {
        prop_assert_eq!(a.merged(&b), b.merged(&a));
    }

    #[test]
    fn clock_merge_associative(a in clock_strategy(), b in clock_strategy(), c in clock_strategy()) {
        prop_assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    }

    #[test]
    fn clock_merge_idempotent(a in clock_strategy()) {
        prop_assert_eq!(a.merged(&a), a);
    }

    #[test]
    fn clock_merge_dominates_inputs(a in clock_strategy(), b in clock_strategy()) {
        let merged = a.merged(&b);
        prop_assert!(merged.dominates(&a));
        prop_assert!(merged.dominates(&b));
    }

    #[test]
    fn clock_compare_yields_exactly_one_case(a in clock_strategy(), b in clock_strategy()) {
        let cases = [
            a.compare(&b) == CausalOrder::Before,
            a.compare(&b) == CausalOrder::After,
            a.compare(&b) == CausalOrder::Concurrent,
            a.compare(&b) == CausalOrder::Equal,
        ];
        prop_assert_eq!(cases.iter().filter(|&&c| c).count(), 1);
    }

    #[test]
    fn clock_compare_is_antisymmetric(a in clock_strategy(), b in clock_strategy()) {
        let forward = a.compare(&b);
        let backward = b.compare(&a);
        let expected = match forward {
            CausalOrder::Before => CausalOrder::After,
            CausalOrder::After => CausalOrder::Before,
            other => other,
        };
        prop_assert_eq!(backward, expected);
    }

    #[test]
    fn counter_merge_commutative(a in counter_strategy(), b in counter_strategy()) {
        prop_assert_eq!(a.merged(&b), b.merged(&a));
    }

    #[test]
    fn counter_merge_associative(
        a in counter_strategy(),
        b in counter_strategy(),
        c in counter_strategy(),
    ) {
        prop_assert_eq!(a.merged(&b).merged(&c), a.merged(&b.merged(&c)));
    }

    #[test]
    fn counter_merge_idempotent(a in counter_strategy()) {
        prop_assert_eq!(a.merged(&a), a);
    }

    #[test]
    fn counter_set_target_reaches_target(mut a in counter_strategy(), target in -500i64..500) {
        a.set_target(&NodeId::new("node-a"), target);
        prop_assert_eq!(a.value(), target);
    }

    #[test]
    fn register_merge_commutative(a in register_strategy(), b in register_strategy()) {
        let ab = a.merged(&b);
        let ba = b.merged(&a);
        prop_assert_eq!(ab.value(), ba.value());
        prop_assert_eq!(ab.timestamp(), ba.timestamp());
    }

    #[test]
    fn register_merge_associative(
        a in register_strategy(),
        b in register_strategy(),
        c in register_strategy(),
    ) {
        let left = a.merged(&b).merged(&c);
        let right = a.merged(&b.merged(&c));
        prop_assert_eq!(left.value(), right.value());
    }

    #[test]
    fn register_merge_idempotent(a in register_strategy()) {
        let merged = a.merged(&a);
        prop_assert_eq!(merged.value(), a.value());
    }

    #[test]
    fn three_replica_convergence(
        a in counter_strategy(),
        b in counter_strategy(),
        c in counter_strategy(),
    ) {
        // Full mesh exchange: every replica ends up identical
        let mut ra = a.clone();
        let mut rb = b.clone();
        let mut rc = c.clone();

        ra.merge(&b);
        ra.merge(&c);
        rb.merge(&c);
        rb.merge(&a);
        rc.merge(&a);
        rc.merge(&b);

        prop_assert_eq!(&ra, &rb);
        prop_assert_eq!(&rb, &rc);
    }
}
