//! Shopping-list domain model for Basket.
//!
//! Two layers live here:
//!
//! - The in-memory aggregates [`List`] and [`Item`], which embed the CRDTs
//!   by value (LWW register for names, PN counters for quantities, a vector
//!   clock per entity) and expose target-value mutations that convert "set
//!   quantity to 5" into commutative counter deltas.
//! - The wire layer: plain-value records ([`ListRecord`], [`ItemRecord`])
//!   shared by the HTTP surface, the replication mesh, and the persisted
//!   layout, plus the request bodies and the typed change events the
//!   coordinator fans out.
//!
//! The records deliberately carry visible values rather than CRDT tallies;
//! every receiver feeds them back through the target-to-delta conversion,
//! so per-node tallies stay process-local.

mod events;
mod item;
mod list;
mod ops;
mod wire;

pub use events::{ChangeEvent, DeletedList, RemovedItem};
pub use item::Item;
pub use list::List;
pub use ops::{OpKind, PendingOp};
pub use wire::{
    CreateItemBody, CreateListBody, ItemRecord, ListRecord, NameBody, QuantityBody, ToggleBody,
};
