//! # Consistency Protocol Selector
//!
//! Pure decision logic for each [`ConsistencyMode`]. The leaf service applies
//! these decisions and performs the resulting sends.
//!
//! | Mode | On local update | On `obtain` of a cached copy |
//! |---|---|---|
//! | none | nothing | served |
//! | push | flood `invalidate` | served |
//! | pull-validate | nothing | `upToDate` round trip first |
//! | version-authority | `updateVersion` + `fileOutOfDate` | served |
//!
//! Invalidations are honoured in every mode: a leaf never keeps serving a
//! copy it has been told is behind.

use crate::domain::{LeafFileRecord, ReplicaState};
use shared_types::{ConsistencyMode, Version};

/// Messages an owner sends after bumping a file's version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Flood `invalidate` through the super.
    pub flood_invalidation: bool,
    /// Report the new version with `updateVersion`.
    pub report_version: bool,
    /// Ask the super to nudge known holders with `fileOutOfDate`.
    pub nudge_holders: bool,
}

impl UpdatePlan {
    pub fn is_silent(&self) -> bool {
        *self == Self::default()
    }
}

pub fn plan_update(mode: ConsistencyMode) -> UpdatePlan {
    UpdatePlan {
        flood_invalidation: mode.pushes_invalidations(),
        report_version: mode.tracks_versions(),
        nudge_holders: mode.tracks_versions(),
    }
}

/// Reaction of a holder to an incoming invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidationAction {
    /// Not a cached holder, or already at (or past) the incoming version.
    Ignore,
    /// Record `version`, stop serving, and refetch unless one is in flight.
    Invalidate { version: Version, refetch: bool },
}

pub fn on_invalidation(record: Option<&LeafFileRecord>, incoming: Version) -> InvalidationAction {
    match record {
        Some(record) if !record.is_owner() && record.version < incoming => {
            InvalidationAction::Invalidate {
                version: incoming,
                refetch: record.state != ReplicaState::Refetching,
            }
        }
        _ => InvalidationAction::Ignore,
    }
}

/// Whether a staleness signal (`fileOutOfDate` or a failed `upToDate`)
/// should start a refetch.
pub fn on_out_of_date(record: Option<&LeafFileRecord>) -> bool {
    matches!(record, Some(record) if !record.is_owner() && record.state != ReplicaState::Refetching)
}
