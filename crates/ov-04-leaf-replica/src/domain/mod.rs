//! # Domain Layer for the Leaf Replica Manager
//!
//! ```text
//! Absent ──search──→ Searching ──hit──→ Fetching ──receive──→ Valid
//!                                                              │  ↑
//!                             invalidate / fileOutOfDate /     │  │ receive
//!                             failed upToDate                  ↓  │
//!                                                 Invalid ──→ Refetching
//! ```
//!
//! - **entities**: `LeafFileRecord`, `FileRole`, `ReplicaState`, `PendingRequest`
//! - **value_objects**: `ReplicaTable`, `PendingTable`, `ReplicaMetrics`

mod entities;
mod value_objects;

pub use entities::*;
pub use value_objects::*;
