//! # Leaf Replica Manager (ov-04)
//!
//! A leaf owns files, caches copies of other leaves' files, serves `obtain`
//! requests, and keeps its copies consistent under the configured
//! [`ConsistencyMode`](shared_types::ConsistencyMode).
//!
//! ## Architecture Role
//!
//! ```text
//!  [Leaf] ──query──→ [Super] ──queryHit──→ [Leaf] ──obtain──→ [Holder leaf]
//!     │                                        ↑                    │
//!     │                                        └──── file payload ──┘
//!     └── add / updateVersion (after each new copy) ──→ [Super]
//! ```
//!
//! ## Guarantees
//!
//! - A requested file is downloaded at most once per hit; later hits for a
//!   file already being fetched are ignored.
//! - A cached copy's version never decreases.
//! - An owned file is never invalidated and its version only grows by local
//!   edits.
//! - At most one refetch per file is in flight.
//! - A copy marked `Invalid` or `Refetching` is never served.

pub mod adapters;
pub mod config;
pub mod consistency;
pub mod domain;
pub mod handler;
pub mod ports;
pub mod service;

pub use adapters::{FsBlobStore, MemoryBlobStore};
pub use config::{ConfigError, FetchStrategy, LeafConfig};
pub use consistency::{plan_update, InvalidationAction, UpdatePlan};
pub use domain::*;
pub use ports::inbound::LeafReplicaApi;
pub use ports::outbound::BlobStore;
pub use service::LeafNode;
