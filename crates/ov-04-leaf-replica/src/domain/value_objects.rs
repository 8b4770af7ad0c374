//! # Replica and Request Tables
//!
//! State transitions for one leaf's copies. Every method is a single
//! critical section; callers hold the table lock only for the call.

use super::entities::{FileRole, LeafFileRecord, PendingRequest, ReceiveOutcome, ReplicaState};
use crate::consistency::{on_invalidation, on_out_of_date, InvalidationAction};
use shared_types::{FileName, PeerId, Version};
use std::collections::HashMap;

/// Every file this leaf holds, owned or cached. Records are never removed.
#[derive(Debug, Default)]
pub struct ReplicaTable {
    records: HashMap<FileName, LeafFileRecord>,
}

impl ReplicaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Author `file` at version 0. Returns `false` if a record already exists.
    pub fn insert_owned(&mut self, file: FileName) -> bool {
        if self.records.contains_key(&file) {
            return false;
        }
        self.records
            .insert(file.clone(), LeafFileRecord::owned(file));
        true
    }

    pub fn get(&self, file: &FileName) -> Option<&LeafFileRecord> {
        self.records.get(file)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Owned files in name order.
    pub fn owned_files(&self) -> Vec<(FileName, Version)> {
        self.sorted(|record| record.is_owner())
    }

    /// Cached files in name order.
    pub fn cached_files(&self) -> Vec<(FileName, Version)> {
        self.sorted(|record| !record.is_owner())
    }

    fn sorted(&self, keep: impl Fn(&LeafFileRecord) -> bool) -> Vec<(FileName, Version)> {
        let mut files: Vec<(FileName, Version)> = self
            .records
            .values()
            .filter(|record| keep(record))
            .map(|record| (record.file.clone(), record.version))
            .collect();
        files.sort();
        files
    }

    /// Record a local edit of an owned file. Returns the new version.
    pub fn bump_owned(&mut self, file: &FileName) -> Option<Version> {
        let record = self.records.get_mut(file).filter(|r| r.is_owner())?;
        record.version += 1;
        Some(record.version)
    }

    /// What [`apply_receive`](Self::apply_receive) would do, without doing it.
    pub fn classify_receive(&self, file: &FileName, version: Version) -> ReceiveOutcome {
        match self.records.get(file) {
            None => ReceiveOutcome::FirstCopy,
            Some(record) if record.is_owner() => ReceiveOutcome::Owned,
            Some(record) if version < record.version => ReceiveOutcome::Stale,
            Some(record) if record.state.is_servable() => ReceiveOutcome::Refreshed,
            Some(_) => ReceiveOutcome::Revalidated,
        }
    }

    /// Apply a completed download.
    ///
    /// A stale download leaves a valid copy alone and drops an invalid or
    /// refetching copy back to `Invalid`.
    pub fn apply_receive(
        &mut self,
        file: &FileName,
        version: Version,
        master: PeerId,
    ) -> ReceiveOutcome {
        let outcome = self.classify_receive(file, version);
        match outcome {
            ReceiveOutcome::FirstCopy => {
                self.records.insert(
                    file.clone(),
                    LeafFileRecord::cached(file.clone(), version, master),
                );
            }
            ReceiveOutcome::Revalidated | ReceiveOutcome::Refreshed => {
                if let Some(record) = self.records.get_mut(file) {
                    record.version = version;
                    record.state = ReplicaState::Valid;
                    record.role = FileRole::Cached { master };
                }
            }
            ReceiveOutcome::Stale => {
                if let Some(record) = self.records.get_mut(file) {
                    if !record.state.is_servable() {
                        record.state = ReplicaState::Invalid;
                    }
                }
            }
            ReceiveOutcome::Owned => {}
        }
        outcome
    }

    /// Apply an invalidation carrying `incoming`.
    ///
    /// Returns the action taken and, when a refetch should start, the master
    /// to fetch from.
    pub fn apply_invalidation(
        &mut self,
        file: &FileName,
        incoming: Version,
    ) -> (InvalidationAction, Option<PeerId>) {
        let action = on_invalidation(self.records.get(file), incoming);
        let InvalidationAction::Invalidate { version, refetch } = action else {
            return (action, None);
        };
        let Some(record) = self.records.get_mut(file) else {
            return (InvalidationAction::Ignore, None);
        };
        record.version = version;
        if refetch {
            record.state = ReplicaState::Refetching;
            (action, record.master())
        } else {
            if record.state == ReplicaState::Valid {
                record.state = ReplicaState::Invalid;
            }
            (action, None)
        }
    }

    /// Mark a cached copy stale and claim the refetch.
    ///
    /// Returns the master to fetch from, or `None` when the file is owned,
    /// absent, or already being refetched.
    pub fn mark_stale(&mut self, file: &FileName) -> Option<PeerId> {
        if !on_out_of_date(self.records.get(file)) {
            return None;
        }
        let record = self.records.get_mut(file)?;
        record.state = ReplicaState::Refetching;
        record.master()
    }

    /// A refetch returned an older version than the one already announced
    /// and left the copy invalid. Claims the next refetch from its master.
    pub fn retry_refetch(&mut self, file: &FileName) -> Option<PeerId> {
        let record = self.records.get_mut(file)?;
        if record.is_owner() || record.state != ReplicaState::Invalid {
            return None;
        }
        record.state = ReplicaState::Refetching;
        record.master()
    }

    /// A refetch failed; the copy stays behind until the next signal.
    pub fn refetch_failed(&mut self, file: &FileName) {
        if let Some(record) = self.records.get_mut(file) {
            if record.state == ReplicaState::Refetching {
                record.state = ReplicaState::Invalid;
            }
        }
    }
}

/// Files requested but not yet held.
#[derive(Debug, Default)]
pub struct PendingTable {
    requests: HashMap<FileName, PendingRequest>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start searching for `file`. Returns `false` if already pending.
    pub fn insert_search(&mut self, file: FileName) -> bool {
        if self.requests.contains_key(&file) {
            return false;
        }
        self.requests.insert(file, PendingRequest::Searching);
        true
    }

    /// Claim the download of a searched file. Only the first hit wins.
    pub fn begin_fetch(&mut self, file: &FileName) -> bool {
        match self.requests.get_mut(file) {
            Some(request) if *request == PendingRequest::Searching => {
                *request = PendingRequest::Fetching;
                true
            }
            _ => false,
        }
    }

    /// The download failed; a later hit may try again.
    pub fn fetch_failed(&mut self, file: &FileName) {
        if let Some(request) = self.requests.get_mut(file) {
            *request = PendingRequest::Searching;
        }
    }

    /// Returns `true` if `file` was pending.
    pub fn complete(&mut self, file: &FileName) -> bool {
        self.requests.remove(file).is_some()
    }

    pub fn get(&self, file: &FileName) -> Option<PendingRequest> {
        self.requests.get(file).copied()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn files(&self) -> Vec<FileName> {
        let mut files: Vec<FileName> = self.requests.keys().cloned().collect();
        files.sort();
        files
    }
}

/// Per-leaf counters reported to the coordinator at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplicaMetrics {
    /// First copies received.
    pub valid: u64,
    /// Stale responses, failed fetches and local I/O errors.
    pub invalid: u64,
    /// Invalid copies restored by a refetch.
    pub revalidated: u64,
    /// Successful `obtain` responses.
    pub served: u64,
}
