//! # Dedup Tables
//!
//! Unbounded history: entries are never evicted for the lifetime of a node.

use shared_types::{MessageId, PeerId};
use std::collections::{HashMap, HashSet};

/// Reverse-path table: message id to the ordered, duplicate-free list of
/// peers that sent us that search.
#[derive(Debug, Default)]
pub struct SearchRouteTable {
    routes: HashMap<MessageId, Vec<PeerId>>,
}

impl SearchRouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `sender` for `msg_id`.
    ///
    /// Returns `true` if this is the first sighting of `msg_id`.
    pub fn record(&mut self, msg_id: MessageId, sender: PeerId) -> bool {
        match self.routes.get_mut(&msg_id) {
            Some(senders) => {
                if !senders.contains(&sender) {
                    senders.push(sender);
                }
                false
            }
            None => {
                self.routes.insert(msg_id, vec![sender]);
                true
            }
        }
    }

    pub fn senders(&self, msg_id: &MessageId) -> Option<&[PeerId]> {
        self.routes.get(msg_id).map(Vec::as_slice)
    }

    pub fn contains(&self, msg_id: &MessageId) -> bool {
        self.routes.contains_key(msg_id)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Set of message ids already acted on.
#[derive(Debug, Default)]
pub struct SeenSet {
    seen: HashSet<MessageId>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `msg_id` was not present before.
    pub fn insert(&mut self, msg_id: MessageId) -> bool {
        self.seen.insert(msg_id)
    }

    pub fn contains(&self, msg_id: &MessageId) -> bool {
        self.seen.contains(msg_id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Counters exposed for diagnostics and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub searches_seen: u64,
    pub searches_forwarded: u64,
    pub hits_forwarded: u64,
    pub invalidations_forwarded: u64,
    pub duplicates_dropped: u64,
}
