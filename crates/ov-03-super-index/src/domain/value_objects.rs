//! # Index Tables
//!
//! Both tables grow monotonically: holders are never pruned and recorded
//! versions never go down.

use shared_types::{FileName, PeerId, Version};
use std::collections::HashMap;

/// File name to the holders that registered it, in registration order.
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    entries: HashMap<FileName, Vec<PeerId>>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert. Returns `true` if `holder` was not yet listed.
    pub fn add(&mut self, file: FileName, holder: PeerId) -> bool {
        let holders = self.entries.entry(file).or_default();
        if holders.contains(&holder) {
            return false;
        }
        holders.push(holder);
        true
    }

    pub fn holders(&self, file: &FileName) -> &[PeerId] {
        self.entries.get(file).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, file: &FileName) -> bool {
        self.entries.contains_key(file)
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FileName, &[PeerId])> {
        self.entries.iter().map(|(f, h)| (f, h.as_slice()))
    }
}

/// A holder's best-known version of one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: Version,
    pub valid: bool,
}

/// File name to per-holder version records.
#[derive(Debug, Default, Clone)]
pub struct VersionTable {
    records: HashMap<FileName, HashMap<PeerId, VersionEntry>>,
}

impl VersionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `version` for `holder` and mark it valid.
    ///
    /// A lower version than the one on record is ignored. Returns the version
    /// now on record.
    pub fn record(&mut self, file: FileName, holder: PeerId, version: Version) -> Version {
        let entry = self
            .records
            .entry(file)
            .or_default()
            .entry(holder)
            .or_insert(VersionEntry {
                version,
                valid: true,
            });
        entry.version = entry.version.max(version);
        entry.valid = true;
        entry.version
    }

    /// Flag `holder`'s copy as behind. No-op if nothing is recorded.
    pub fn mark_invalid(&mut self, file: &FileName, holder: PeerId) {
        if let Some(entry) = self
            .records
            .get_mut(file)
            .and_then(|holders| holders.get_mut(&holder))
        {
            entry.valid = false;
        }
    }

    pub fn entry(&self, file: &FileName, holder: PeerId) -> Option<VersionEntry> {
        self.records.get(file)?.get(&holder).copied()
    }

    /// Highest version any holder has reported for `file`.
    pub fn max_version(&self, file: &FileName) -> Option<Version> {
        self.records
            .get(file)?
            .values()
            .map(|entry| entry.version)
            .max()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
