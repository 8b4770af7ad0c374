//! # Hand-Wired Overlays
//!
//! Builds supers and leaves on one [`InMemoryNetwork`] without a
//! coordinator, so each flow can place peers and links exactly where the
//! scenario needs them.

use ov_01_transport::{ConnectionCache, InMemoryNetwork, TransportConfig};
use ov_03_super_index::{SuperPeerConfig, SuperPeerNode};
use ov_04_leaf_replica::{FetchStrategy, LeafConfig, LeafNode, MemoryBlobStore};
use shared_types::{
    ConsistencyMode, FileName, FixedRandomSource, OverlayError, PeerId, PeerKind, Request,
    Response,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

pub const WAIT: Duration = Duration::from_secs(5);

pub struct Overlay {
    pub network: Arc<InMemoryNetwork>,
    mode: ConsistencyMode,
    start_ttl: u32,
    supers: BTreeMap<PeerId, Arc<SuperPeerNode>>,
    leaves: BTreeMap<PeerId, Arc<LeafNode>>,
}

impl Overlay {
    pub fn new(mode: ConsistencyMode, start_ttl: u32) -> Self {
        Self {
            network: Arc::new(InMemoryNetwork::new()),
            mode,
            start_ttl,
            supers: BTreeMap::new(),
            leaves: BTreeMap::new(),
        }
    }

    /// Register a super linked to `neighbors` (links are one-way; add the
    /// reverse edge on the neighbor for a symmetric link).
    pub fn add_super(&mut self, id: u32, neighbors: &[u32]) -> Arc<SuperPeerNode> {
        let config = SuperPeerConfig::new(PeerId(id), self.start_ttl, self.mode)
            .with_neighbors(neighbors.iter().copied().map(PeerId).collect())
            .with_transport(TransportConfig::for_testing());
        let node = Arc::new(SuperPeerNode::new(config, self.network.clone()));
        self.network.register(PeerId(id), node.clone(), 4);
        self.supers.insert(PeerId(id), node.clone());
        node
    }

    /// Build a leaf without registering it on the network.
    pub fn build_leaf(&self, id: u32, super_peer: u32) -> Arc<LeafNode> {
        let config = LeafConfig::new(PeerId(id), PeerId(super_peer), self.start_ttl, self.mode)
            .with_fetch_strategy(FetchStrategy::RandomHolder)
            .with_transport(TransportConfig::for_testing());
        LeafNode::new(
            config,
            self.network.clone(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(FixedRandomSource::first()),
        )
    }

    pub fn register_leaf(&mut self, leaf: Arc<LeafNode>) {
        self.network.register(leaf.id(), leaf.clone(), 4);
        self.leaves.insert(leaf.id(), leaf);
    }

    pub fn add_leaf(&mut self, id: u32, super_peer: u32) -> Arc<LeafNode> {
        let leaf = self.build_leaf(id, super_peer);
        self.register_leaf(leaf.clone());
        leaf
    }

    /// Register a leaf that owns `files`, then join it to its super.
    pub async fn add_owner(&mut self, id: u32, super_peer: u32, files: &[&str]) -> Arc<LeafNode> {
        let leaf = self.add_leaf(id, super_peer);
        for file in files {
            leaf.create_file(FileName::new(*file), format!("{file} by {id}\n").as_bytes())
                .await
                .unwrap();
        }
        leaf.join_overlay().await.unwrap();
        leaf
    }

    pub fn super_peer(&self, id: u32) -> &Arc<SuperPeerNode> {
        &self.supers[&PeerId(id)]
    }

    pub fn leaf(&self, id: u32) -> &Arc<LeafNode> {
        &self.leaves[&PeerId(id)]
    }

    /// Outbound connections acting as peer `id`, which need not exist.
    pub fn dial(&self, id: u32) -> ConnectionCache {
        ConnectionCache::new(
            PeerId(id),
            self.network.clone(),
            TransportConfig::for_testing(),
        )
    }

    pub async fn call_as(
        &self,
        from: u32,
        to: u32,
        kind: PeerKind,
        request: Request,
    ) -> Result<Response, OverlayError> {
        self.dial(from)
            .connect(PeerId(to), kind)?
            .call(request)
            .await
    }

    /// Wait until no message or background fetch is in flight anywhere.
    pub async fn settle(&self) {
        let mut quiet = 0;
        while quiet < 2 {
            let before = self.network.stats();
            self.network.settle().await;
            for node in self.supers.values() {
                node.settle().await;
            }
            for leaf in self.leaves.values() {
                leaf.settle().await;
            }
            if self.network.stats() == before {
                quiet += 1;
            } else {
                quiet = 0;
            }
        }
    }

    /// Search for `files` from `leaf` and wait for every download.
    pub async fn download(&self, leaf: &LeafNode, files: &[&str]) {
        leaf.request_files(files.iter().map(|file| FileName::new(*file)));
        timeout(WAIT, leaf.wait_complete())
            .await
            .expect("downloads did not complete");
        self.settle().await;
    }

    pub async fn shutdown(&self) {
        for leaf in self.leaves.values() {
            leaf.shutdown().await;
        }
        for node in self.supers.values() {
            node.shutdown().await;
        }
        self.network.drain().await;
    }
}
