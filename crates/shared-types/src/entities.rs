//! # Core Domain Entities
//!
//! Identifiers shared by every node of the overlay.
//!
//! ## Clusters
//!
//! - **Identity**: [`PeerId`], [`PeerKind`]
//! - **Flooding**: [`MessageId`], [`SequenceGenerator`], [`FloodKind`]
//! - **Content**: [`FileName`], [`Version`]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Globally unique peer identifier.
///
/// Immutable for the lifetime of a peer and deterministically mapped to an
/// endpoint by the transport (see [`PeerId::port`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct PeerId(pub u32);

impl PeerId {
    /// The coordinating process always runs as peer 0.
    pub const COORDINATOR: PeerId = PeerId(0);

    /// Creates a peer id.
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Raw integer value.
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Endpoint port for this peer given the deployment's base port.
    pub fn port(self, base: u16) -> u32 {
        u32::from(base) + self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for PeerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Role of a peer in the two-tier overlay.
///
/// Supplied when a connection is registered, never inferred from a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PeerKind {
    /// Relay node indexing the files of its attached leaves.
    Super,
    /// Peer that authors, searches and downloads files.
    Leaf,
    /// The process driving a simulation run.
    Coordinator,
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Super => write!(f, "super"),
            Self::Leaf => write!(f, "leaf"),
            Self::Coordinator => write!(f, "coordinator"),
        }
    }
}

// =============================================================================
// CLUSTER B: FLOODING
// =============================================================================

/// The two kinds of flooded message. Their id spaces never mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloodKind {
    /// Reverse-path routed search.
    Search,
    /// Pure broadcast invalidation.
    Invalidate,
}

/// Identity of a flooded message: originator plus its sequence number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MessageId {
    /// Peer that originated the flood.
    pub origin: PeerId,
    /// Monotonically increasing per-originator sequence number.
    pub seq: u64,
}

impl MessageId {
    pub const fn new(origin: PeerId, seq: u64) -> Self {
        Self { origin, seq }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.origin, self.seq)
    }
}

/// Issues monotonically increasing message ids for one originator.
///
/// A leaf owns one generator per [`FloodKind`].
#[derive(Debug)]
pub struct SequenceGenerator {
    origin: PeerId,
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new(origin: PeerId) -> Self {
        Self {
            origin,
            next: AtomicU64::new(0),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> MessageId {
        MessageId::new(self.origin, self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

// =============================================================================
// CLUSTER C: CONTENT
// =============================================================================

/// File version. Starts at 0 and only ever grows by one per local update.
pub type Version = u64;

/// Opaque file key; the unit of sharing and invalidation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileName(String);

impl FileName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for FileName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
