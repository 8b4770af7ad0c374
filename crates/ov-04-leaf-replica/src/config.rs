//! Leaf configuration.

use ov_01_transport::TransportConfig;
use shared_types::{ConsistencyMode, PeerId};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How a leaf picks among the holders listed in a search hit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One holder chosen by the injected random source.
    #[default]
    RandomHolder,
    /// Every holder at once; the first successful copy wins.
    FirstSuccess,
}

impl FromStr for FetchStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" | "random-holder" => Ok(Self::RandomHolder),
            "first" | "first-success" => Ok(Self::FirstSuccess),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for FetchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RandomHolder => write!(f, "random-holder"),
            Self::FirstSuccess => write!(f, "first-success"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LeafConfig {
    pub id: PeerId,
    /// The super this leaf is attached to.
    pub super_peer: PeerId,
    /// TTL for searches and invalidations this leaf originates.
    pub start_ttl: u32,
    pub mode: ConsistencyMode,
    pub fetch_strategy: FetchStrategy,
    pub coordinator: Option<PeerId>,
    pub transport: TransportConfig,
}

impl Default for LeafConfig {
    fn default() -> Self {
        Self {
            id: PeerId(2),
            super_peer: PeerId(1),
            start_ttl: 3,
            mode: ConsistencyMode::default(),
            fetch_strategy: FetchStrategy::default(),
            coordinator: None,
            transport: TransportConfig::default(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("start TTL must be at least 1")]
    ZeroTtl,

    #[error("leaf {0} cannot be its own super")]
    SelfSuper(PeerId),

    #[error("leaf id {0} is reserved for the coordinator")]
    ReservedId(PeerId),

    #[error("unknown fetch strategy: {0}")]
    UnknownStrategy(String),
}

impl LeafConfig {
    pub fn new(id: PeerId, super_peer: PeerId, start_ttl: u32, mode: ConsistencyMode) -> Self {
        Self {
            id,
            super_peer,
            start_ttl,
            mode,
            ..Self::default()
        }
    }

    pub fn with_fetch_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.fetch_strategy = strategy;
        self
    }

    pub fn with_coordinator(mut self, coordinator: PeerId) -> Self {
        self.coordinator = Some(coordinator);
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
        if self.id == self.super_peer {
            return Err(ConfigError::SelfSuper(self.id));
        }
        Ok(())
    }
}
