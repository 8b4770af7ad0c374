//! # Simulation Configuration
//!
//! One run's shape: overlay size, workload, consistency mode and runtime
//! limits. Every field has a default; the binary overrides them from the
//! command line or `OV_*` environment variables.

use crate::wiring::Topology;
use ov_01_transport::TransportConfig;
use ov_04_leaf_replica::FetchStrategy;
use shared_types::ConsistencyMode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Complete simulation configuration.
#[derive(Debug, Clone, Default)]
pub struct SimulationConfig {
    pub overlay: OverlayConfig,
    pub workload: WorkloadConfig,
    pub consistency: ConsistencyConfig,
    pub runtime: RuntimeConfig,
}

/// Overlay shape.
#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub n_supers: u32,
    pub leaves_per_super: u32,
    pub topology: Topology,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            n_supers: 5,
            leaves_per_super: 3,
            topology: Topology::AllToAll,
        }
    }
}

/// Files, requests and updates.
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    /// Files authored by each initial leaf.
    pub files_per_leaf: usize,
    /// Files each initial leaf requests (capped by what others own).
    pub requests_per_leaf: usize,
    /// Random bytes appended to each generated file.
    pub file_padding: usize,
    /// Leaves that join during the update phase.
    pub extra_leaves: u32,
    /// Files each extra leaf requests.
    pub extra_requests: usize,
    /// Local updates performed by each initial leaf.
    pub update_rounds: usize,
    /// Pause before each update.
    pub update_interval: Duration,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            files_per_leaf: 20,
            requests_per_leaf: 10,
            file_padding: 1024,
            extra_leaves: 1,
            extra_requests: 200,
            update_rounds: 5,
            update_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsistencyConfig {
    pub mode: ConsistencyMode,
    pub fetch_strategy: FetchStrategy,
}

/// Limits and environment for the run.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Seed for every random choice; `None` draws from OS entropy.
    pub seed: Option<u64>,
    /// Upper bound on each wait for `ready`, `complete` or `metrics`.
    pub phase_timeout: Duration,
    /// Store leaf files under `<data_dir>/leaf-<id>/`; in memory when `None`.
    pub data_dir: Option<PathBuf>,
    pub transport: TransportConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            seed: None,
            phase_timeout: Duration::from_secs(30),
            data_dir: None,
            transport: TransportConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one super-peer is required")]
    NoSupers,

    #[error("at least one leaf per super-peer is required")]
    NoLeaves,

    #[error("phase timeout must be non-zero")]
    ZeroTimeout,

    #[error("{0} peers exceed the peer id space")]
    TooManyPeers(u64),

    #[error("super-peer configuration: {0}")]
    Super(#[from] ov_03_super_index::ConfigError),

    #[error("leaf configuration: {0}")]
    Leaf(#[from] ov_04_leaf_replica::ConfigError),
}

impl SimulationConfig {
    /// Number of leaves present from the start.
    pub fn initial_leaves(&self) -> u32 {
        self.overlay.n_supers * self.overlay.leaves_per_super
    }

    pub fn start_ttl(&self) -> u32 {
        self.overlay.topology.start_ttl(self.overlay.n_supers)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.overlay.n_supers == 0 {
            return Err(ConfigError::NoSupers);
        }
        if self.overlay.leaves_per_super == 0 {
            return Err(ConfigError::NoLeaves);
        }
        if self.runtime.phase_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        let peers = 1
            + u64::from(self.overlay.n_supers)
            + u64::from(self.overlay.n_supers) * u64::from(self.overlay.leaves_per_super)
            + u64::from(self.workload.extra_leaves);
        if peers > u64::from(u32::MAX) {
            return Err(ConfigError::TooManyPeers(peers));
        }
        Ok(())
    }
}
