//! # Flood Router (ov-02)
//!
//! Dedup and TTL mechanics shared by search and invalidation floods, plus
//! reverse-path bookkeeping for search replies.
//!
//! ## Architecture Role
//!
//! ```text
//!             query (ttl)                      queryHit (ttl)
//! [Leaf] ──→ [Super A] ──→ [Super B] ... ──→ back along SearchRoute
//!                 │
//!                 └── invalidate ──→ children + neighbors (pure broadcast)
//! ```
//!
//! The router never performs I/O. Each `route_*` call updates the dedup
//! tables under their own locks and returns the list of forwards; the hosting
//! super-peer sends them after every lock is released.
//!
//! ## Asymmetry
//!
//! Searches are tree-routed: replies follow the recorded reverse path.
//! Invalidations are flooded: there is no reverse path and no reply. The two
//! message kinds keep separate dedup tables and are never compared.

pub mod domain;
pub mod service;

pub use domain::*;
pub use service::FloodRouter;
