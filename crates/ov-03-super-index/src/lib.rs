//! # Super-Peer Index & Version Authority (ov-03)
//!
//! A super-peer indexes the files its leaves hold, relays searches and
//! invalidations through the [flood router](ov_02_flood_router), and acts as
//! the version authority for its region.
//!
//! ## Architecture Role
//!
//! ```text
//!  [Leaf] ──add/updateVersion──→ [Super] ──query/invalidate──→ [Neighbor supers]
//!     ↑                             │
//!     └── queryHit / fileOutOfDate ─┘
//! ```
//!
//! ## Tables
//!
//! | Table | Content | Lock |
//! |---|---|---|
//! | `FileIndex` | file → holders (insertion order, never pruned) | `RwLock` |
//! | `VersionTable` | file → holder → (version, valid) | `Mutex` |
//! | search routes, hit/invalidate seen | see `ov-02` | one lock each |
//!
//! A holder list may contain leaves that have since left the overlay;
//! `fileOutOfDate` nudges are cast to all of them regardless.

pub mod config;
pub mod domain;
pub mod handler;
pub mod ports;
pub mod service;

pub use config::{ConfigError, SuperPeerConfig};
pub use domain::*;
pub use ports::inbound::SuperPeerApi;
pub use service::SuperPeerNode;
