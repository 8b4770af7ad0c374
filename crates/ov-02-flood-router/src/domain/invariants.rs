//! Routing invariants.

use super::Forward;
use shared_types::PeerId;

/// INVARIANT-1: TTL decrements strictly by one per hop, and nothing is
/// forwarded once it would reach zero.
///
/// Returns the TTL for the next hop, or `None` when forwarding must stop.
pub fn next_hop_ttl(ttl: u32) -> Option<u32> {
    ttl.checked_sub(1).filter(|next| *next > 0)
}

/// INVARIANT-2: a forward set never targets the same peer twice and never
/// targets `excluded`.
pub fn invariant_unique_targets(forwards: &[Forward], excluded: Option<PeerId>) -> bool {
    let mut seen = std::collections::HashSet::new();
    forwards
        .iter()
        .all(|f| Some(f.to) != excluded && seen.insert(f.to))
}

/// Fan `ttl` out to `targets`, skipping `excluded`.
pub fn fan_out(targets: &[PeerId], excluded: Option<PeerId>, ttl: u32) -> Vec<Forward> {
    targets
        .iter()
        .copied()
        .filter(|peer| Some(*peer) != excluded)
        .map(|peer| Forward::new(peer, ttl))
        .collect()
}
