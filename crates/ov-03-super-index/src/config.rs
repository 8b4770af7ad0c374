//! Super-peer configuration.

use ov_01_transport::TransportConfig;
use shared_types::{ConsistencyMode, PeerId};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct SuperPeerConfig {
    pub id: PeerId,
    /// TTL given to searches answered locally, and the topology's flood depth.
    pub start_ttl: u32,
    pub mode: ConsistencyMode,
    /// Neighbor supers this node floods to.
    pub neighbors: Vec<PeerId>,
    /// Leaves that must report `ready` before this super reports upward.
    pub expected_children: usize,
    /// Coordinator to report readiness to, if any.
    pub coordinator: Option<PeerId>,
    pub transport: TransportConfig,
}

impl Default for SuperPeerConfig {
    fn default() -> Self {
        Self {
            id: PeerId(1),
            start_ttl: 3,
            mode: ConsistencyMode::default(),
            neighbors: Vec::new(),
            expected_children: 0,
            coordinator: None,
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("start TTL must be at least 1")]
    ZeroTtl,

    #[error("super {0} lists itself as a neighbor")]
    SelfNeighbor(PeerId),

    #[error("super id {0} is reserved for the coordinator")]
    ReservedId(PeerId),
}

impl SuperPeerConfig {
    pub fn new(id: PeerId, start_ttl: u32, mode: ConsistencyMode) -> Self {
        Self {
            id,
            start_ttl,
            mode,
            ..Self::default()
        }
    }

    pub fn with_neighbors(mut self, neighbors: Vec<PeerId>) -> Self {
        self.neighbors = neighbors;
        self
    }

    pub fn with_coordinator(mut self, coordinator: PeerId, expected_children: usize) -> Self {
        self.coordinator = Some(coordinator);
        self.expected_children = expected_children;
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start_ttl == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        if self.id == PeerId::COORDINATOR {
            return Err(ConfigError::ReservedId(self.id));
        }
        if self.neighbors.contains(&self.id) {
            return Err(ConfigError::SelfNeighbor(self.id));
        }
        Ok(())
    }
}
