//! # Routing Decisions
//!
//! What the router tells its host to send.

use shared_types::PeerId;

/// One outbound copy of a flooded message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Forward {
    pub to: PeerId,
    /// TTL the copy carries (already decremented).
    pub ttl: u32,
}

impl Forward {
    pub fn new(to: PeerId, ttl: u32) -> Self {
        Self { to, ttl }
    }
}

/// Outcome of routing a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchDecision {
    /// First time this node saw the message: the host answers from its
    /// local index. Repeats only extend the reverse path.
    pub first_sighting: bool,
    pub forwards: Vec<Forward>,
}

impl SearchDecision {
    pub fn repeat() -> Self {
        Self {
            first_sighting: false,
            forwards: Vec::new(),
        }
    }
}

/// Outcome of routing a first-seen invalidation.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct InvalidatePlan {
    /// Attached leaves; always notified.
    pub children: Vec<Forward>,
    /// Neighbor supers; only while TTL remains.
    pub neighbors: Vec<Forward>,
}

impl InvalidatePlan {
    pub fn all(&self) -> impl Iterator<Item = &Forward> {
        self.children.iter().chain(self.neighbors.iter())
    }

    pub fn len(&self) -> usize {
        self.children.len() + self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of the generic [`FloodRouter::route`](crate::FloodRouter::route) entry point.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    Search(SearchDecision),
    /// `None` when the invalidation was already flooded.
    Invalidate(Option<InvalidatePlan>),
}
