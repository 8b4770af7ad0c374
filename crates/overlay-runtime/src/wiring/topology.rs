//! # Super-Peer Topology
//!
//! Neighbor lists, start TTLs and leaf placement. Peer ids are laid out as:
//! coordinator `0`, supers `1..=n_supers`, leaves after.

use serde::{Deserialize, Serialize};
use shared_types::PeerId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// TTL that reaches every super in a fully connected overlay with headroom.
pub const ALL_TO_ALL_TTL: u32 = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    /// Every super neighbors every other super.
    #[default]
    AllToAll,
    /// Supers form a chain `1 - 2 - ... - n`.
    Linear,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown topology: {0}")]
pub struct UnknownTopology(pub String);

impl FromStr for Topology {
    type Err = UnknownTopology;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "all" | "all-to-all" => Ok(Self::AllToAll),
            "1" | "linear" | "chain" => Ok(Self::Linear),
            other => Err(UnknownTopology(other.to_string())),
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllToAll => f.write_str("all-to-all"),
            Self::Linear => f.write_str("linear"),
        }
    }
}

impl Topology {
    /// TTL used by every search and invalidation originated in the run.
    ///
    /// A linear chain needs one hop per super for a search to reach the far
    /// end.
    pub fn start_ttl(self, n_supers: u32) -> u32 {
        match self {
            Self::AllToAll => ALL_TO_ALL_TTL,
            Self::Linear => n_supers.max(1),
        }
    }

    /// Neighbor supers of `id`, ascending.
    pub fn neighbors(self, id: PeerId, n_supers: u32) -> Vec<PeerId> {
        match self {
            Self::AllToAll => super_ids(n_supers).filter(|peer| *peer != id).collect(),
            Self::Linear => {
                let mut neighbors = Vec::with_capacity(2);
                if id.0 > 1 {
                    neighbors.push(PeerId(id.0 - 1));
                }
                if id.0 < n_supers {
                    neighbors.push(PeerId(id.0 + 1));
                }
                neighbors
            }
        }
    }
}

pub fn super_ids(n_supers: u32) -> impl Iterator<Item = PeerId> {
    (1..=n_supers).map(PeerId)
}

/// The super leaf number `index` (0-based) attaches to.
pub fn super_for_leaf(index: u32, n_supers: u32) -> PeerId {
    PeerId(index % n_supers.max(1) + 1)
}

/// Peer id of leaf number `index` (0-based).
pub fn leaf_id(index: u32, n_supers: u32) -> PeerId {
    PeerId(n_supers + 1 + index)
}
