//! # Shared Types Crate
//!
//! This crate contains the identifiers, RPC payloads, error taxonomy and
//! configuration enums shared by every node of the overlay.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type that crosses a node boundary is
//!   defined here, so super-peers and leaves agree on the wire surface.
//! - **Explicit Peer Kind**: a `PeerId` never implies its role; the role travels
//!   as a separate [`PeerKind`] tag wherever it matters.
//! - **Independent Message Spaces**: search and invalidation floods draw their
//!   `MessageId`s from separate [`SequenceGenerator`]s.

pub mod consistency;
pub mod entities;
pub mod errors;
pub mod ipc;
pub mod random;

pub use consistency::ConsistencyMode;
pub use entities::*;
pub use errors::*;
pub use ipc::*;
pub use random::{FixedRandomSource, RandomSource, SeededRandomSource};
