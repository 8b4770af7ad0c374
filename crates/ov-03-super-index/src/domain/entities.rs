//! Index snapshots and version verdicts.

use shared_types::{FileName, PeerId, Version};

/// Point-in-time copy of a super's index, sorted by file name.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub node: PeerId,
    pub files: Vec<IndexedFile>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedFile {
    pub file: FileName,
    pub holders: Vec<PeerId>,
    /// Highest version reported by any holder, if versions are tracked.
    pub max_version: Option<Version>,
}

impl IndexSnapshot {
    pub fn holders(&self, file: &FileName) -> Option<&[PeerId]> {
        self.files
            .iter()
            .find(|entry| &entry.file == file)
            .map(|entry| entry.holders.as_slice())
    }
}

/// Outcome of a `checkVersion` request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VersionVerdict {
    /// Caller holds the newest version on record (or nothing is recorded).
    Current,
    /// A holder reported a strictly newer version.
    Behind { newest: Version },
}

impl VersionVerdict {
    pub fn is_current(&self) -> bool {
        matches!(self, Self::Current)
    }
}

/// Compare a caller's version against the newest on record.
pub fn judge_version(newest: Option<Version>, caller: Version) -> VersionVerdict {
    match newest {
        Some(newest) if newest > caller => VersionVerdict::Behind { newest },
        _ => VersionVerdict::Current,
    }
}
