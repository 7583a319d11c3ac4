//! CRDT implementations for Basket.
//!
//! This crate provides the Conflict-free Replicated Data Types the store is
//! built from:
//!
//! - [`VectorClock`] — causality tracking across nodes and clients
//! - [`LwwRegister<T>`] — Last-Writer-Wins register for single values
//! - [`PnCounter`] — Positive-Negative counter for distributed inc/dec
//! - [`AworSet<V>`] — Add-Wins Observed-Remove set keyed by item ID
//!
//! All CRDTs in this crate satisfy the following properties:
//! - **Commutative**: merge(a, b) == merge(b, a)
//! - **Associative**: merge(merge(a, b), c) == merge(a, merge(b, c))
//! - **Idempotent**: merge(a, a) == a
//!
//! These properties ensure that replicas converge to the same state
//! regardless of the order in which updates are received.

mod awor_set;
mod lww_register;
mod pn_counter;
mod vector_clock;

pub use awor_set::{AworSet, FieldMerge, Tag};
pub use lww_register::LwwRegister;
pub use pn_counter::PnCounter;
pub use vector_clock::{CausalOrder, VectorClock};
