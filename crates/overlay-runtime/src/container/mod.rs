//! # Overlay Container
//!
//! Owns every node of one simulation and the network they share.
//!
//! ## Initialization Order
//!
//! 1. Coordinator (peer 0, one worker)
//! 2. Supers, each with its topology neighbors
//! 3. Initial leaves, each with its owned files written to its store

pub mod config;

pub use config::{
    ConfigError, ConsistencyConfig, OverlayConfig, RuntimeConfig, SimulationConfig,
    WorkloadConfig,
};

use crate::handlers::Coordinator;
use crate::wiring::super_ids;
use crate::workload::{initial_content, LeafPlan};
use ov_01_transport::InMemoryNetwork;
use ov_03_super_index::{SuperPeerConfig, SuperPeerNode};
use ov_04_leaf_replica::{BlobStore, FsBlobStore, LeafConfig, LeafNode, MemoryBlobStore};
use shared_types::{PeerId, RandomSource, SeededRandomSource};
use std::sync::Arc;
use tracing::{debug, info};

pub struct OverlayContainer {
    pub config: SimulationConfig,
    pub network: Arc<InMemoryNetwork>,
    pub coordinator: Arc<Coordinator>,
    pub supers: Vec<Arc<SuperPeerNode>>,
    pub leaves: Vec<Arc<LeafNode>>,
    random: Arc<dyn RandomSource>,
}

impl OverlayContainer {
    /// Build the coordinator and supers. Leaves are added with
    /// [`add_leaf`](Self::add_leaf).
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let random: Arc<dyn RandomSource> = match config.runtime.seed {
            Some(seed) => Arc::new(SeededRandomSource::new(seed)),
            None => Arc::new(SeededRandomSource::from_entropy()),
        };
        let network = Arc::new(InMemoryNetwork::new());
        let transport = config.runtime.transport.clone();

        let coordinator = Arc::new(Coordinator::new());
        network.register(
            PeerId::COORDINATOR,
            coordinator.clone(),
            transport.coordinator_workers,
        );

        let ttl = config.start_ttl();
        let mut supers = Vec::new();
        for id in super_ids(config.overlay.n_supers) {
            let super_config = SuperPeerConfig::new(id, ttl, config.consistency.mode)
                .with_neighbors(config.overlay.topology.neighbors(id, config.overlay.n_supers))
                .with_coordinator(
                    PeerId::COORDINATOR,
                    config.overlay.leaves_per_super as usize,
                )
                .with_transport(transport.clone());
            super_config.validate()?;
            let node = Arc::new(SuperPeerNode::new(super_config, network.clone()));
            network.register(id, node.clone(), transport.workers_per_peer);
            supers.push(node);
        }

        info!(
            supers = supers.len(),
            topology = %config.overlay.topology,
            ttl,
            mode = %config.consistency.mode,
            "Overlay supers created"
        );

        Ok(Self {
            config,
            network,
            coordinator,
            supers,
            leaves: Vec::new(),
            random,
        })
    }

    pub fn random(&self) -> &dyn RandomSource {
        self.random.as_ref()
    }

    /// Create a leaf, register it on the network and author its files.
    pub async fn add_leaf(&mut self, plan: &LeafPlan) -> anyhow::Result<Arc<LeafNode>> {
        let transport = self.config.runtime.transport.clone();
        let leaf_config = LeafConfig::new(
            plan.id,
            plan.super_peer,
            self.config.start_ttl(),
            self.config.consistency.mode,
        )
        .with_fetch_strategy(self.config.consistency.fetch_strategy)
        .with_coordinator(PeerId::COORDINATOR)
        .with_transport(transport.clone());
        leaf_config.validate().map_err(ConfigError::from)?;

        let store: Arc<dyn BlobStore> = match &self.config.runtime.data_dir {
            Some(dir) => Arc::new(FsBlobStore::new(dir.join(format!("leaf-{}", plan.id)))),
            None => Arc::new(MemoryBlobStore::new()),
        };
        let leaf = LeafNode::new(leaf_config, self.network.clone(), store, self.random.clone());

        for file in &plan.owned {
            let content = initial_content(
                plan.id,
                self.config.workload.file_padding,
                self.random.as_ref(),
            );
            leaf.create_file(file.clone(), &content).await?;
        }
        self.network
            .register(plan.id, leaf.clone(), transport.workers_per_peer);
        debug!(leaf = %plan.id, super_peer = %plan.super_peer, files = plan.owned.len(), "Leaf created");

        self.leaves.push(leaf.clone());
        Ok(leaf)
    }

    pub fn super_peer(&self, id: PeerId) -> Option<&Arc<SuperPeerNode>> {
        self.supers.iter().find(|node| node.id() == id)
    }

    pub fn leaf(&self, id: PeerId) -> Option<&Arc<LeafNode>> {
        self.leaves.iter().find(|node| node.id() == id)
    }

    /// Wait until every in-flight message and background task has finished.
    pub async fn settle(&self) {
        // Each pass can trigger work on another node; two quiet passes in a
        // row means nothing is left.
        let mut quiet = 0;
        while quiet < 2 {
            let before = self.network.stats();
            self.network.settle().await;
            for node in &self.supers {
                node.settle().await;
            }
            for leaf in &self.leaves {
                leaf.settle().await;
            }
            if self.network.stats() == before {
                quiet += 1;
            } else {
                quiet = 0;
            }
        }
    }

    /// Join every node's background work, then stop the network.
    pub async fn shutdown(&self) {
        for leaf in &self.leaves {
            leaf.shutdown().await;
        }
        for node in &self.supers {
            node.shutdown().await;
        }
        self.network.drain().await;
        info!(stats = ?self.network.stats(), "Overlay shut down");
    }
}
