//! # Super-Peer Node
//!
//! Owns the file index, the version table, the flood router and the
//! connection cache of one super-peer.
//!
//! ## Concurrency
//!
//! Every table sits behind its own lock. Handlers update state, collect the
//! messages to send, drop all guards, then hand the sends to the node's
//! [`TaskSet`]. A failed forward is logged and never affects other edges.

use crate::config::SuperPeerConfig;
use crate::domain::{
    judge_version, FileIndex, IndexSnapshot, IndexedFile, VersionTable, VersionVerdict,
};
use crate::ports::inbound::SuperPeerApi;
use ov_01_transport::{ConnectionCache, TaskSet, Transport};
use ov_02_flood_router::{FloodRouter, RouterStats};
use parking_lot::{Mutex, RwLock};
use shared_types::{
    FileName, MessageId, OverlayError, PeerId, PeerKind, Request, Version,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub struct SuperPeerNode {
    config: SuperPeerConfig,
    router: FloodRouter,
    connections: ConnectionCache,
    index: RwLock<FileIndex>,
    versions: Mutex<VersionTable>,
    /// Attached leaves, in attach order.
    children: RwLock<Vec<PeerId>>,
    ready_children: Mutex<HashSet<PeerId>>,
    ready_changed: Notify,
    ended: AtomicBool,
    end_signal: Notify,
    tasks: TaskSet,
}

impl SuperPeerNode {
    pub fn new(config: SuperPeerConfig, transport: Arc<dyn Transport>) -> Self {
        let connections = ConnectionCache::new(config.id, transport, config.transport.clone());
        for neighbor in &config.neighbors {
            connections.register(*neighbor, PeerKind::Super);
        }
        if let Some(coordinator) = config.coordinator {
            connections.register(coordinator, PeerKind::Coordinator);
        }

        Self {
            router: FloodRouter::new(config.id, config.neighbors.clone()),
            connections,
            index: RwLock::new(FileIndex::new()),
            versions: Mutex::new(VersionTable::new()),
            children: RwLock::new(Vec::new()),
            ready_children: Mutex::new(HashSet::new()),
            ready_changed: Notify::new(),
            ended: AtomicBool::new(false),
            end_signal: Notify::new(),
            tasks: TaskSet::new(),
            config,
        }
    }

    pub fn id(&self) -> PeerId {
        self.config.id
    }

    pub fn config(&self) -> &SuperPeerConfig {
        &self.config
    }

    pub fn router_stats(&self) -> RouterStats {
        self.router.stats()
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    /// Attached leaves, in attach order.
    pub fn children(&self) -> Vec<PeerId> {
        self.children.read().clone()
    }

    /// Link a neighbor super after construction.
    pub fn add_neighbor(&self, peer: PeerId) {
        self.connections.register(peer, PeerKind::Super);
        self.router.add_neighbor(peer);
    }

    /// Record `leaf` as a child of this super. Idempotent.
    pub fn attach_leaf(&self, leaf: PeerId) {
        self.connections.register(leaf, PeerKind::Leaf);
        let mut children = self.children.write();
        if !children.contains(&leaf) {
            children.push(leaf);
            debug!(node = %self.id(), %leaf, "[ov-03] Leaf attached");
        }
    }

    /// A child finished its startup registration.
    pub fn child_ready(&self, leaf: PeerId) {
        self.attach_leaf(leaf);
        let count = {
            let mut ready = self.ready_children.lock();
            ready.insert(leaf);
            ready.len()
        };
        debug!(node = %self.id(), %leaf, ready = count, "[ov-03] Child ready");
        self.ready_changed.notify_waiters();
    }

    pub fn ready_count(&self) -> usize {
        self.ready_children.lock().len()
    }

    /// Resolve once at least `expected` children have reported ready.
    pub async fn wait_children_ready(&self, expected: usize) {
        loop {
            let notified = self.ready_changed.notified();
            if self.ready_count() >= expected {
                return;
            }
            notified.await;
        }
    }

    /// Wait for the configured children, then report ready to the
    /// coordinator (if one is configured).
    pub async fn run_startup(&self) -> Result<(), OverlayError> {
        self.wait_children_ready(self.config.expected_children)
            .await;
        let Some(coordinator) = self.config.coordinator else {
            return Ok(());
        };
        let connection = self
            .connections
            .handshake(coordinator, PeerKind::Coordinator)
            .await?;
        connection.call(Request::Ready { peer: self.id() }).await?;
        info!(
            node = %self.id(),
            children = self.config.expected_children,
            "[ov-03] Super ready"
        );
        Ok(())
    }

    /// Stop signal from the coordinator.
    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::AcqRel) {
            info!(node = %self.id(), "[ov-03] End received");
        }
        self.end_signal.notify_waiters();
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub async fn wait_end(&self) {
        loop {
            let notified = self.end_signal.notified();
            if self.is_ended() {
                return;
            }
            notified.await;
        }
    }

    /// Join all in-flight forwards without stopping the node.
    pub async fn settle(&self) {
        self.tasks.join_all().await;
    }

    /// Join all in-flight forwards, then release connections.
    pub async fn shutdown(&self) {
        self.tasks.shutdown().await;
        self.connections.clear();
        info!(node = %self.id(), "[ov-03] Super shut down");
    }

    /// Synchronous call to `to` in a tracked background task.
    fn send(&self, to: PeerId, request: Request) {
        let node = self.id();
        let method = request.method();
        let connection = match self.connections.get(to) {
            Ok(connection) => connection,
            Err(err) => {
                warn!(%node, %to, method, error = %err, "[ov-03] Forward skipped");
                return;
            }
        };
        self.tasks.spawn(async move {
            if let Err(err) = connection.call(request).await {
                warn!(%node, to = %connection.peer(), method, error = %err, "[ov-03] Forward failed");
            }
        });
    }

    /// Fire-and-forget notice to `to`.
    fn notify(&self, to: PeerId, request: Request) {
        match self.connections.get(to) {
            Ok(connection) => connection.cast(request),
            Err(err) => {
                warn!(node = %self.id(), %to, method = request.method(), error = %err, "[ov-03] Notice skipped");
            }
        }
    }
}

impl SuperPeerApi for SuperPeerNode {
    fn add(&self, leaf: PeerId, file: FileName, version: Version) {
        self.attach_leaf(leaf);
        let added = self.index.write().add(file.clone(), leaf);
        if self.config.mode.tracks_versions() {
            self.versions.lock().record(file.clone(), leaf, version);
        }
        if added {
            debug!(node = %self.id(), %leaf, %file, version, "[ov-03] Holder registered");
        }
    }

    fn query(&self, sender: PeerId, msg_id: MessageId, ttl: u32, file: FileName) {
        let decision = self.router.route_search(sender, msg_id, ttl);
        if !decision.first_sighting {
            return;
        }

        let holders = self.index.read().holders(&file).to_vec();
        if !holders.is_empty() {
            debug!(node = %self.id(), %msg_id, %file, holders = holders.len(), "[ov-03] Answering search");
            self.send(
                sender,
                Request::QueryHit {
                    sender: self.id(),
                    msg_id,
                    ttl: self.config.start_ttl,
                    file: file.clone(),
                    holders,
                },
            );
        }

        for forward in decision.forwards {
            self.send(
                forward.to,
                Request::Query {
                    sender: self.id(),
                    msg_id,
                    ttl: forward.ttl,
                    file: file.clone(),
                },
            );
        }
    }

    fn query_hit(
        &self,
        sender: PeerId,
        msg_id: MessageId,
        ttl: u32,
        file: FileName,
        holders: Vec<PeerId>,
    ) {
        for forward in self.router.route_hit(sender, msg_id, ttl) {
            self.send(
                forward.to,
                Request::QueryHit {
                    sender: self.id(),
                    msg_id,
                    ttl: forward.ttl,
                    file: file.clone(),
                    holders: holders.clone(),
                },
            );
        }
    }

    fn invalidate(
        &self,
        msg_id: MessageId,
        master: PeerId,
        ttl: u32,
        file: FileName,
        version: Version,
    ) {
        let children: Vec<PeerId> = self
            .children
            .read()
            .iter()
            .copied()
            .filter(|child| *child != master)
            .collect();
        let Some(plan) = self.router.route_invalidate(msg_id, ttl, &children) else {
            return;
        };
        for forward in plan.all() {
            self.send(
                forward.to,
                Request::Invalidate {
                    msg_id,
                    master,
                    ttl: forward.ttl,
                    file: file.clone(),
                    version,
                },
            );
        }
    }

    fn update_version(&self, leaf: PeerId, file: FileName, version: Version) {
        let recorded = self.versions.lock().record(file.clone(), leaf, version);
        debug!(node = %self.id(), %leaf, %file, version, recorded, "[ov-03] Version updated");
    }

    fn check_version(&self, sender: PeerId, file: FileName, version: Version) -> VersionVerdict {
        let verdict = {
            let mut versions = self.versions.lock();
            let verdict = judge_version(versions.max_version(&file), version);
            if !verdict.is_current() {
                versions.mark_invalid(&file, sender);
            }
            verdict
        };
        if let VersionVerdict::Behind { newest } = verdict {
            debug!(node = %self.id(), %sender, %file, version, newest, "[ov-03] Caller out of date");
            self.notify(sender, Request::FileOutOfDate { file });
        }
        verdict
    }

    fn file_out_of_date(&self, from: PeerId, file: FileName) {
        let holders = self.index.read().holders(&file).to_vec();
        for holder in holders.into_iter().filter(|holder| *holder != from) {
            self.notify(holder, Request::FileOutOfDate { file: file.clone() });
        }
    }

    fn dump_index(&self) -> IndexSnapshot {
        let index = self.index.read();
        let versions = self.versions.lock();
        let mut files: Vec<IndexedFile> = index
            .iter()
            .map(|(file, holders)| IndexedFile {
                file: file.clone(),
                holders: holders.to_vec(),
                max_version: versions.max_version(file),
            })
            .collect();
        files.sort_by(|a, b| a.file.cmp(&b.file));
        IndexSnapshot {
            node: self.id(),
            files,
        }
    }
}
