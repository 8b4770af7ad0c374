//! # Replica Records
//!
//! Per-file state held by one leaf.

use shared_types::{FileName, PeerId, Version};

/// Who authored the copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileRole {
    /// Created locally. Never leaves `Valid`.
    Owner,
    /// Downloaded from `master`.
    Cached { master: PeerId },
}

/// Freshness of a copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplicaState {
    Valid,
    /// Known to be behind; not served.
    Invalid,
    /// Behind, with a download from the master in flight.
    Refetching,
}

impl ReplicaState {
    pub fn is_servable(self) -> bool {
        matches!(self, Self::Valid)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafFileRecord {
    pub file: FileName,
    pub version: Version,
    pub role: FileRole,
    pub state: ReplicaState,
}

impl LeafFileRecord {
    pub fn owned(file: FileName) -> Self {
        Self {
            file,
            version: 0,
            role: FileRole::Owner,
            state: ReplicaState::Valid,
        }
    }

    pub fn cached(file: FileName, version: Version, master: PeerId) -> Self {
        Self {
            file,
            version,
            role: FileRole::Cached { master },
            state: ReplicaState::Valid,
        }
    }

    pub fn is_owner(&self) -> bool {
        matches!(self.role, FileRole::Owner)
    }

    /// Peer authoritative for this copy's version; `local` for owned files.
    pub fn master_or(&self, local: PeerId) -> PeerId {
        match self.role {
            FileRole::Owner => local,
            FileRole::Cached { master } => master,
        }
    }

    pub fn master(&self) -> Option<PeerId> {
        match self.role {
            FileRole::Owner => None,
            FileRole::Cached { master } => Some(master),
        }
    }
}

/// Outstanding request for a file this leaf does not hold yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PendingRequest {
    /// Search issued, no hit yet.
    Searching,
    /// Hit received, download in flight.
    Fetching,
}

/// What a `receive` did to the local copy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// First copy of the file: record created.
    FirstCopy,
    /// Invalid copy restored to `Valid`.
    Revalidated,
    /// Already valid; bytes and version refreshed.
    Refreshed,
    /// Older than the version on record; nothing stored.
    Stale,
    /// This leaf owns the file; downloads are ignored.
    Owned,
}

impl ReceiveOutcome {
    /// Whether the incoming bytes should be written to the blob store.
    pub fn persists(self) -> bool {
        matches!(self, Self::FirstCopy | Self::Revalidated | Self::Refreshed)
    }
}
