//! # Peer Identity & Transport Facade (ov-01)
//!
//! Maps integer peer ids to reusable outbound connection handles and provides
//! the in-process transport substrate every node runs on.
//!
//! ## Architecture Role
//!
//! ```text
//!  [Super / Leaf service] ──Connection::call/cast──→ [Transport port]
//!                                                          │
//!                                                          ↓
//!                                                  [InMemoryNetwork]
//!                                                          │ worker pool (4 permits)
//!                                                          ↓
//!                                                 [Endpoint::handle] of callee
//! ```
//!
//! ## Guarantees
//!
//! - Connections are created lazily and cached per peer id; concurrent first
//!   use yields exactly one tracked connection.
//! - Every cached connection carries the [`PeerKind`](shared_types::PeerKind)
//!   it was registered with. Unregistered ids are rejected, not guessed.
//! - Startup handshakes retry with a fresh connection; steady-state calls
//!   never retry.
//! - Delivery is not guaranteed; callers tolerate loss and duplicates.

#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod connection;
pub mod memory;
pub mod ports;
pub mod tasks;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use config::TransportConfig;
pub use connection::{Connection, ConnectionCache};
pub use memory::{InMemoryNetwork, NetworkStats};
pub use ports::inbound::Endpoint;
pub use ports::outbound::Transport;
pub use tasks::TaskSet;
