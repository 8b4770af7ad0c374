//! # Connection Cache
//!
//! Lazily created, reusable outbound connection handles keyed by peer id.
//!
//! ## Rules
//!
//! 1. A peer must be registered with its [`PeerKind`] before a connection to
//!    it can be created. The cache never guesses the kind of an unknown id.
//! 2. Creation happens under the cache lock, so concurrent first use from
//!    several handlers produces exactly one tracked connection.
//! 3. The lock is released before any call goes out.

use crate::config::TransportConfig;
use crate::ports::outbound::Transport;
use parking_lot::Mutex;
use shared_types::{OverlayError, PeerId, PeerKind, Request, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reusable outbound handle to one peer.
pub struct Connection {
    owner: PeerId,
    peer: PeerId,
    kind: PeerKind,
    generation: u64,
    call_timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl Connection {
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    pub fn kind(&self) -> PeerKind {
        self.kind
    }

    /// Creation sequence number within the owning cache.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Synchronous call with the steady-state timeout. Never retried.
    pub async fn call(&self, request: Request) -> Result<Response, OverlayError> {
        self.call_with_timeout(request, self.call_timeout).await
    }

    pub async fn call_with_timeout(
        &self,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, OverlayError> {
        self.transport
            .call(self.owner, self.peer, request, timeout)
            .await
    }

    /// Fire-and-forget.
    pub fn cast(&self, request: Request) {
        self.transport.cast(self.owner, self.peer, request);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("owner", &self.owner)
            .field("peer", &self.peer)
            .field("kind", &self.kind)
            .field("generation", &self.generation)
            .finish()
    }
}

#[derive(Default)]
struct CacheState {
    kinds: HashMap<PeerId, PeerKind>,
    connections: HashMap<PeerId, Arc<Connection>>,
}

/// Per-node map from peer id to cached connection.
pub struct ConnectionCache {
    owner: PeerId,
    config: TransportConfig,
    transport: Arc<dyn Transport>,
    state: Mutex<CacheState>,
    created: AtomicU64,
}

impl ConnectionCache {
    pub fn new(owner: PeerId, transport: Arc<dyn Transport>, config: TransportConfig) -> Self {
        Self {
            owner,
            config,
            transport,
            state: Mutex::new(CacheState::default()),
            created: AtomicU64::new(0),
        }
    }

    pub fn owner(&self) -> PeerId {
        self.owner
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Record `peer`'s kind. Idempotent; a later registration with a
    /// different kind wins and drops any cached handle.
    pub fn register(&self, peer: PeerId, kind: PeerKind) {
        let mut state = self.state.lock();
        match state.kinds.insert(peer, kind) {
            Some(previous) if previous != kind => {
                warn!(owner = %self.owner, %peer, %previous, %kind, "Peer kind changed");
                state.connections.remove(&peer);
            }
            _ => {}
        }
    }

    /// Kind recorded for `peer`, if registered.
    pub fn kind_of(&self, peer: PeerId) -> Option<PeerKind> {
        self.state.lock().kinds.get(&peer).copied()
    }

    /// Registered peers of `kind`, in id order.
    pub fn peers_of_kind(&self, kind: PeerKind) -> Vec<PeerId> {
        let state = self.state.lock();
        let mut peers: Vec<PeerId> = state
            .kinds
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(peer, _)| *peer)
            .collect();
        peers.sort();
        peers
    }

    /// Cached connection to `peer`, created on first use.
    pub fn get(&self, peer: PeerId) -> Result<Arc<Connection>, OverlayError> {
        let mut state = self.state.lock();
        if let Some(connection) = state.connections.get(&peer) {
            return Ok(connection.clone());
        }
        let kind = *state
            .kinds
            .get(&peer)
            .ok_or(OverlayError::UnknownPeer(peer))?;
        let connection = Arc::new(Connection {
            owner: self.owner,
            peer,
            kind,
            generation: self.created.fetch_add(1, Ordering::Relaxed),
            call_timeout: self.config.call_timeout,
            transport: self.transport.clone(),
        });
        state.connections.insert(peer, connection.clone());
        debug!(owner = %self.owner, %peer, %kind, "Connection created");
        Ok(connection)
    }

    /// Register and fetch in one step.
    pub fn connect(&self, peer: PeerId, kind: PeerKind) -> Result<Arc<Connection>, OverlayError> {
        self.register(peer, kind);
        self.get(peer)
    }

    /// Drop the cached handle so the next `get` creates a fresh one.
    pub fn evict(&self, peer: PeerId) {
        self.state.lock().connections.remove(&peer);
    }

    /// Number of connections ever created by this cache.
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub fn cached_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Release every cached handle.
    pub fn clear(&self) {
        self.state.lock().connections.clear();
    }

    /// Startup handshake: ping `peer` with a short timeout until it answers,
    /// replacing the connection after each failed attempt.
    pub async fn handshake(
        &self,
        peer: PeerId,
        kind: PeerKind,
    ) -> Result<Arc<Connection>, OverlayError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let connection = self.connect(peer, kind)?;
            match connection
                .call_with_timeout(Request::Ping, self.config.handshake_timeout)
                .await
            {
                Ok(_) => {
                    info!(owner = %self.owner, %peer, %kind, attempts, "Handshake complete");
                    return Ok(connection);
                }
                Err(err) if err.is_transport() => {
                    debug!(owner = %self.owner, %peer, attempts, error = %err, "Ping failed, retrying");
                    self.evict(peer);
                    if let Some(max) = self.config.max_handshake_attempts {
                        if attempts >= max {
                            warn!(owner = %self.owner, %peer, attempts, "Handshake abandoned");
                            return Err(err);
                        }
                    }
                    tokio::time::sleep(self.config.handshake_retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
