//! # Flood Router Service
//!
//! Thread-safe wrapper around the dedup tables. Every table has its own lock
//! and no lock is held when a `route_*` call returns, so the caller can
//! perform the sends freely.

use crate::domain::{
    fan_out, next_hop_ttl, Forward, InvalidatePlan, RouteDecision, RouterStats, SearchDecision,
    SearchRouteTable, SeenSet,
};
use parking_lot::{Mutex, RwLock};
use shared_types::{FloodKind, MessageId, PeerId};
use tracing::{debug, trace};

pub struct FloodRouter {
    local: PeerId,
    neighbors: RwLock<Vec<PeerId>>,
    search_routes: Mutex<SearchRouteTable>,
    hits_seen: Mutex<SeenSet>,
    invalidations_seen: Mutex<SeenSet>,
    stats: Mutex<RouterStats>,
}

impl FloodRouter {
    pub fn new(local: PeerId, neighbors: Vec<PeerId>) -> Self {
        Self {
            local,
            neighbors: RwLock::new(neighbors),
            search_routes: Mutex::new(SearchRouteTable::new()),
            hits_seen: Mutex::new(SeenSet::new()),
            invalidations_seen: Mutex::new(SeenSet::new()),
            stats: Mutex::new(RouterStats::default()),
        }
    }

    pub fn local(&self) -> PeerId {
        self.local
    }

    pub fn neighbors(&self) -> Vec<PeerId> {
        self.neighbors.read().clone()
    }

    /// Add a neighbor super. Ignores self-links and duplicates.
    pub fn add_neighbor(&self, peer: PeerId) {
        if peer == self.local {
            return;
        }
        let mut neighbors = self.neighbors.write();
        if !neighbors.contains(&peer) {
            neighbors.push(peer);
        }
    }

    pub fn stats(&self) -> RouterStats {
        *self.stats.lock()
    }

    /// Peers recorded as having sent search `msg_id`, in arrival order.
    pub fn search_route(&self, msg_id: &MessageId) -> Vec<PeerId> {
        self.search_routes
            .lock()
            .senders(msg_id)
            .map(<[PeerId]>::to_vec)
            .unwrap_or_default()
    }

    /// Route an incoming search.
    ///
    /// On first sighting the sender is recorded and the search is forwarded to
    /// every neighbor except the sender while TTL remains. Repeat sightings
    /// only extend the reverse path.
    pub fn route_search(&self, sender: PeerId, msg_id: MessageId, ttl: u32) -> SearchDecision {
        let first = self.search_routes.lock().record(msg_id, sender);
        if !first {
            self.stats.lock().duplicates_dropped += 1;
            trace!(node = %self.local, %msg_id, %sender, "[ov-02] Duplicate search, route extended");
            return SearchDecision::repeat();
        }

        let forwards = match next_hop_ttl(ttl) {
            Some(next) => fan_out(&self.neighbors.read(), Some(sender), next),
            None => Vec::new(),
        };

        {
            let mut stats = self.stats.lock();
            stats.searches_seen += 1;
            stats.searches_forwarded += forwards.len() as u64;
        }
        debug!(
            node = %self.local,
            %msg_id,
            %sender,
            ttl,
            forwards = forwards.len(),
            "[ov-02] Routing search"
        );

        SearchDecision {
            first_sighting: true,
            forwards,
        }
    }

    /// Route a search reply back along the recorded reverse path.
    ///
    /// Hits for unknown searches are dropped, as are repeats and hits whose
    /// TTL is exhausted.
    pub fn route_hit(&self, replier: PeerId, msg_id: MessageId, ttl: u32) -> Vec<Forward> {
        let route = self.search_route(&msg_id);
        if route.is_empty() {
            debug!(node = %self.local, %msg_id, "[ov-02] Hit for unknown search dropped");
            return Vec::new();
        }
        let Some(next) = next_hop_ttl(ttl) else {
            trace!(node = %self.local, %msg_id, "[ov-02] Hit TTL exhausted");
            return Vec::new();
        };
        if !self.hits_seen.lock().insert(msg_id) {
            self.stats.lock().duplicates_dropped += 1;
            trace!(node = %self.local, %msg_id, %replier, "[ov-02] Duplicate hit suppressed");
            return Vec::new();
        }

        let forwards = fan_out(&route, Some(replier), next);
        self.stats.lock().hits_forwarded += forwards.len() as u64;
        forwards
    }

    /// Route an invalidation flood.
    ///
    /// Returns `None` on repeat sighting. Children are always notified;
    /// neighbor supers only while TTL remains.
    pub fn route_invalidate(
        &self,
        msg_id: MessageId,
        ttl: u32,
        children: &[PeerId],
    ) -> Option<InvalidatePlan> {
        if !self.invalidations_seen.lock().insert(msg_id) {
            self.stats.lock().duplicates_dropped += 1;
            trace!(node = %self.local, %msg_id, "[ov-02] Duplicate invalidation dropped");
            return None;
        }

        let plan = InvalidatePlan {
            children: fan_out(children, None, ttl.saturating_sub(1)),
            neighbors: match next_hop_ttl(ttl) {
                Some(next) => fan_out(&self.neighbors.read(), None, next),
                None => Vec::new(),
            },
        };

        self.stats.lock().invalidations_forwarded += plan.len() as u64;
        debug!(
            node = %self.local,
            %msg_id,
            ttl,
            children = plan.children.len(),
            neighbors = plan.neighbors.len(),
            "[ov-02] Flooding invalidation"
        );
        Some(plan)
    }

    /// Single entry point for both flood kinds.
    ///
    /// `children` is only consulted for invalidations.
    pub fn route(
        &self,
        kind: FloodKind,
        msg_id: MessageId,
        ttl: u32,
        sender: PeerId,
        children: &[PeerId],
    ) -> RouteDecision {
        match kind {
            FloodKind::Search => RouteDecision::Search(self.route_search(sender, msg_id, ttl)),
            FloodKind::Invalidate => {
                RouteDecision::Invalidate(self.route_invalidate(msg_id, ttl, children))
            }
        }
    }
}
