//! # Leaf Node
//!
//! Owns one leaf's replica records, outstanding requests, metrics and
//! background downloads.
//!
//! ## Locks
//!
//! | Lock | Guards |
//! |---|---|
//! | `records` (`RwLock`) | per-file role, version and state |
//! | `pending` (`Mutex`) | outstanding searches and downloads |
//! | `metrics` (`Mutex`) | counters |
//!
//! No guard is held across an `.await`. The `upToDate` round trip made while
//! serving `obtain` under pull-validate runs with every lock released.

use crate::config::{FetchStrategy, LeafConfig};
use crate::consistency::{plan_update, InvalidationAction};
use crate::domain::{LeafFileRecord, PendingTable, ReceiveOutcome, ReplicaMetrics, ReplicaTable};
use crate::ports::inbound::LeafReplicaApi;
use crate::ports::outbound::BlobStore;
use async_trait::async_trait;
use futures::future::select_ok;
use ov_01_transport::{ConnectionCache, TaskSet, Transport};
use parking_lot::{Mutex, RwLock};
use shared_types::{
    FileName, FilePayload, MessageId, OverlayError, PeerId, PeerKind, RandomSource, Request,
    SequenceGenerator, Version,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{Notify, RwLock as ContentLock};
use tracing::{debug, info, trace, warn};

/// Bytes of random padding appended to generated file content.
const CONTENT_PADDING: usize = 64;

/// Why a download was started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchPurpose {
    /// First copy of a requested file.
    Download,
    /// Replace a stale cached copy from its master.
    Refetch,
}

pub struct LeafNode {
    me: Weak<LeafNode>,
    config: LeafConfig,
    connections: ConnectionCache,
    store: Arc<dyn BlobStore>,
    random: Arc<dyn RandomSource>,
    searches: SequenceGenerator,
    invalidations: SequenceGenerator,
    records: RwLock<ReplicaTable>,
    /// Held across a store write and the record change that labels it, so
    /// a served copy never pairs new bytes with an old version.
    content: ContentLock<()>,
    pending: Mutex<PendingTable>,
    pending_changed: Notify,
    metrics: Mutex<ReplicaMetrics>,
    started: AtomicBool,
    start_signal: Notify,
    ended: AtomicBool,
    end_signal: Notify,
    tasks: TaskSet,
}

impl LeafNode {
    pub fn new(
        config: LeafConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn BlobStore>,
        random: Arc<dyn RandomSource>,
    ) -> Arc<Self> {
        let connections = ConnectionCache::new(config.id, transport, config.transport.clone());
        connections.register(config.super_peer, PeerKind::Super);
        if let Some(coordinator) = config.coordinator {
            connections.register(coordinator, PeerKind::Coordinator);
        }

        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            connections,
            store,
            random,
            searches: SequenceGenerator::new(config.id),
            invalidations: SequenceGenerator::new(config.id),
            records: RwLock::new(ReplicaTable::new()),
            content: ContentLock::new(()),
            pending: Mutex::new(PendingTable::new()),
            pending_changed: Notify::new(),
            metrics: Mutex::new(ReplicaMetrics::default()),
            started: AtomicBool::new(false),
            start_signal: Notify::new(),
            ended: AtomicBool::new(false),
            end_signal: Notify::new(),
            tasks: TaskSet::new(),
            config,
        })
    }

    pub fn id(&self) -> PeerId {
        self.config.id
    }

    pub fn config(&self) -> &LeafConfig {
        &self.config
    }

    pub fn connections(&self) -> &ConnectionCache {
        &self.connections
    }

    pub fn metrics(&self) -> ReplicaMetrics {
        *self.metrics.lock()
    }

    pub fn record(&self, file: &FileName) -> Option<LeafFileRecord> {
        self.records.read().get(file).cloned()
    }

    pub fn owned_files(&self) -> Vec<(FileName, Version)> {
        self.records.read().owned_files()
    }

    pub fn cached_files(&self) -> Vec<(FileName, Version)> {
        self.records.read().cached_files()
    }

    /// Number of requested files not yet received.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn pending_files(&self) -> Vec<FileName> {
        self.pending.lock().files()
    }

    // =========================================================================
    // Local files
    // =========================================================================

    /// Author `file` with `bytes` at version 0.
    pub async fn create_file(&self, file: FileName, bytes: &[u8]) -> Result<(), OverlayError> {
        if matches!(self.record(&file), Some(record) if !record.is_owner()) {
            return Err(OverlayError::NotOwner(file));
        }
        let _content = self.content.write().await;
        self.store.write(&file, bytes).await?;
        if self.records.write().insert_owned(file.clone()) {
            debug!(leaf = %self.id(), %file, "[ov-04] File created");
        }
        Ok(())
    }

    /// Content written for `version` of an owned file.
    fn generate_content(&self, version: Version) -> Vec<u8> {
        let mut content = format!("Created by leaf {}\nVersion {}\n", self.id(), version).into_bytes();
        let mut padding = [0u8; CONTENT_PADDING];
        self.random.fill_printable(&mut padding);
        content.extend_from_slice(&padding);
        content
    }

    /// Edit a random owned file: bump its version, persist new content and
    /// drive the active consistency mode.
    ///
    /// Returns `None` if this leaf owns nothing.
    pub async fn update_random_file(&self) -> Result<Option<(FileName, Version)>, OverlayError> {
        let owned = self.owned_files();
        if owned.is_empty() {
            return Ok(None);
        }
        let Some((file, current)) = owned.get(self.random.random_usize(owned.len())).cloned()
        else {
            return Ok(None);
        };

        let content = self.generate_content(current + 1);
        let bumped = {
            let _content = self.content.write().await;
            self.store.write(&file, &content).await?;
            self.records.write().bump_owned(&file)
        };
        let Some(version) = bumped else {
            return Ok(None);
        };

        info!(leaf = %self.id(), %file, version, mode = %self.config.mode, "[ov-04] File updated");
        self.publish_update(file.clone(), version);
        Ok(Some((file, version)))
    }

    fn publish_update(&self, file: FileName, version: Version) {
        let plan = plan_update(self.config.mode);
        if plan.report_version {
            self.send(
                self.config.super_peer,
                Request::UpdateVersion {
                    leaf: self.id(),
                    file: file.clone(),
                    version,
                },
            );
        }
        if plan.nudge_holders {
            self.cast(
                self.config.super_peer,
                Request::FileOutOfDate { file: file.clone() },
            );
        }
        if plan.flood_invalidation {
            self.send(
                self.config.super_peer,
                Request::Invalidate {
                    msg_id: self.invalidations.next_id(),
                    master: self.id(),
                    ttl: self.config.start_ttl,
                    file,
                    version,
                },
            );
        }
    }

    /// Perform `rounds` updates, one every `interval`. Failed updates are
    /// logged and skipped.
    pub async fn run_update_loop(&self, interval: Duration, rounds: usize) -> usize {
        let mut updated = 0;
        for _ in 0..rounds {
            tokio::time::sleep(interval).await;
            match self.update_random_file().await {
                Ok(Some(_)) => updated += 1,
                Ok(None) => break,
                Err(err) => warn!(leaf = %self.id(), error = %err, "[ov-04] Update failed"),
            }
        }
        updated
    }

    // =========================================================================
    // Searches and downloads
    // =========================================================================

    /// Search for each file not already held or pending. Returns the number
    /// of searches issued.
    pub fn request_files<I>(&self, files: I) -> usize
    where
        I: IntoIterator<Item = FileName>,
    {
        let mut issued = 0;
        for file in files {
            if self.record(&file).is_some() {
                continue;
            }
            if !self.pending.lock().insert_search(file.clone()) {
                continue;
            }
            let msg_id = self.searches.next_id();
            debug!(leaf = %self.id(), %msg_id, %file, "[ov-04] Searching");
            self.cast(
                self.config.super_peer,
                Request::Query {
                    sender: self.id(),
                    msg_id,
                    ttl: self.config.start_ttl,
                    file,
                },
            );
            issued += 1;
        }
        issued
    }

    /// Resolve once every requested file has arrived.
    ///
    /// Never resolves if the only holder of a pending file is gone; callers
    /// bound the wait.
    pub async fn wait_complete(&self) {
        loop {
            let notified = self.pending_changed.notified();
            if self.pending_count() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn complete_request(&self, file: &FileName) {
        let (removed, remaining) = {
            let mut pending = self.pending.lock();
            (pending.complete(file), pending.len())
        };
        if removed {
            if remaining == 0 {
                info!(leaf = %self.id(), "[ov-04] All requested files received");
            }
            self.pending_changed.notify_waiters();
        }
    }

    fn spawn_fetch(&self, file: FileName, holders: Vec<PeerId>, purpose: FetchPurpose) {
        let Some(node) = self.me.upgrade() else {
            return;
        };
        trace!(leaf = %self.id(), %file, ?purpose, holders = holders.len(), "[ov-04] Fetch scheduled");
        let spawned = self
            .tasks
            .spawn(async move { node.fetch(file, holders, purpose).await });
        if !spawned {
            debug!(leaf = %self.id(), "[ov-04] Fetch rejected: node shut down");
        }
    }

    async fn fetch(&self, file: FileName, holders: Vec<PeerId>, purpose: FetchPurpose) {
        let payload = match self.download(&file, &holders).await {
            Ok(payload) => payload,
            Err(err) => {
                warn!(leaf = %self.id(), %file, ?purpose, error = %err, "[ov-04] Download failed");
                self.metrics.lock().invalid += 1;
                self.fetch_failed(&file, purpose);
                return;
            }
        };
        if let Err(err) = self.receive(payload).await {
            warn!(leaf = %self.id(), %file, ?purpose, error = %err, "[ov-04] Store failed");
            self.fetch_failed(&file, purpose);
        }
    }

    fn fetch_failed(&self, file: &FileName, purpose: FetchPurpose) {
        match purpose {
            FetchPurpose::Download => self.pending.lock().fetch_failed(file),
            FetchPurpose::Refetch => self.records.write().refetch_failed(file),
        }
    }

    async fn download(
        &self,
        file: &FileName,
        holders: &[PeerId],
    ) -> Result<FilePayload, OverlayError> {
        match self.config.fetch_strategy {
            FetchStrategy::RandomHolder => {
                let holder = holders
                    .get(self.random.random_usize(holders.len()))
                    .copied()
                    .ok_or_else(|| OverlayError::NotFound(file.clone()))?;
                self.obtain_from(holder, file).await
            }
            FetchStrategy::FirstSuccess => {
                if holders.is_empty() {
                    return Err(OverlayError::NotFound(file.clone()));
                }
                let attempts = holders
                    .iter()
                    .map(|holder| Box::pin(self.obtain_from(*holder, file)));
                select_ok(attempts).await.map(|(payload, _)| payload)
            }
        }
    }

    async fn obtain_from(&self, holder: PeerId, file: &FileName) -> Result<FilePayload, OverlayError> {
        let connection = self.connections.get(holder)?;
        connection
            .call(Request::Obtain {
                requester: self.id(),
                file: file.clone(),
            })
            .await?
            .into_file()
    }

    async fn ask_master(
        &self,
        master: PeerId,
        file: &FileName,
        version: Version,
    ) -> Result<bool, OverlayError> {
        let connection = self.connections.get(master)?;
        connection
            .call(Request::UpToDate {
                file: file.clone(),
                version,
            })
            .await?
            .into_up_to_date()
    }

    // =========================================================================
    // Version authority
    // =========================================================================

    /// Ask the super whether a newer version of a cached `file` exists.
    ///
    /// A `false` answer is followed by a `fileOutOfDate` callback that
    /// triggers the refetch.
    pub async fn check_version(&self, file: &FileName) -> Result<bool, OverlayError> {
        let Some(record) = self.record(file) else {
            return Err(OverlayError::NotFound(file.clone()));
        };
        let connection = self.connections.get(self.config.super_peer)?;
        connection
            .call(Request::CheckVersion {
                sender: self.id(),
                file: file.clone(),
                version: record.version,
            })
            .await?
            .into_up_to_date()
    }

    /// Check every cached file. Returns how many were reported behind.
    pub async fn check_versions(&self) -> usize {
        let mut behind = 0;
        for (file, _) in self.cached_files() {
            match self.check_version(&file).await {
                Ok(true) => {}
                Ok(false) => behind += 1,
                Err(err) => {
                    warn!(leaf = %self.id(), %file, error = %err, "[ov-04] Version check failed")
                }
            }
        }
        behind
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Handshake with the super, register every owned file, then report ready.
    pub async fn join_overlay(&self) -> Result<(), OverlayError> {
        let super_peer = self
            .connections
            .handshake(self.config.super_peer, PeerKind::Super)
            .await?;
        let owned = self.owned_files();
        for (file, version) in &owned {
            super_peer
                .call(Request::Add {
                    leaf: self.id(),
                    file: file.clone(),
                    version: *version,
                })
                .await?;
        }
        super_peer.call(Request::Ready { peer: self.id() }).await?;
        info!(leaf = %self.id(), super_peer = %self.config.super_peer, files = owned.len(), "[ov-04] Joined overlay");
        Ok(())
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.start_signal.notify_waiters();
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub async fn wait_start(&self) {
        loop {
            let notified = self.start_signal.notified();
            if self.is_started() {
                return;
            }
            notified.await;
        }
    }

    pub fn end(&self) {
        self.ended.store(true, Ordering::Release);
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

    /// Tell the coordinator every requested file arrived.
    pub async fn report_complete(&self) -> Result<(), OverlayError> {
        self.call_coordinator(Request::Complete { peer: self.id() })
            .await
    }

    /// Send the final counters to the coordinator.
    pub async fn report_metrics(&self) -> Result<(), OverlayError> {
        let metrics = self.metrics();
        self.call_coordinator(Request::Metrics {
            peer: self.id(),
            valid: metrics.valid,
            invalid: metrics.invalid,
        })
        .await
    }

    async fn call_coordinator(&self, request: Request) -> Result<(), OverlayError> {
        let Some(coordinator) = self.config.coordinator else {
            return Ok(());
        };
        self.connections.get(coordinator)?.call(request).await?;
        Ok(())
    }

    /// Join background downloads without stopping the node.
    pub async fn settle(&self) {
        self.tasks.join_all().await;
    }

    /// Join background downloads, then release connections.
    pub async fn shutdown(&self) {
        self.tasks.shutdown().await;
        self.connections.clear();
        info!(leaf = %self.id(), metrics = ?self.metrics(), "[ov-04] Leaf shut down");
    }

    // =========================================================================
    // Outbound helpers
    // =========================================================================

    /// Synchronous call in a tracked background task.
    fn send(&self, to: PeerId, request: Request) {
        let leaf = self.id();
        let method = request.method();
        let connection = match self.connections.get(to) {
            Ok(connection) => connection,
            Err(err) => {
                warn!(%leaf, %to, method, error = %err, "[ov-04] Send skipped");
                return;
            }
        };
        self.tasks.spawn(async move {
            if let Err(err) = connection.call(request).await {
                warn!(%leaf, to = %connection.peer(), method, error = %err, "[ov-04] Send failed");
            }
        });
    }

    fn cast(&self, to: PeerId, request: Request) {
        match self.connections.get(to) {
            Ok(connection) => connection.cast(request),
            Err(err) => {
                warn!(leaf = %self.id(), %to, method = request.method(), error = %err, "[ov-04] Cast skipped");
            }
        }
    }
}

#[async_trait]
impl LeafReplicaApi for LeafNode {
    fn query_hit(&self, file: FileName, holders: Vec<PeerId>) {
        let holders: Vec<PeerId> = holders
            .into_iter()
            .filter(|holder| *holder != self.id())
            .collect();
        if holders.is_empty() {
            return;
        }
        if !self.pending.lock().begin_fetch(&file) {
            trace!(leaf = %self.id(), %file, "[ov-04] Hit ignored");
            return;
        }
        for holder in &holders {
            self.connections.register(*holder, PeerKind::Leaf);
        }
        self.spawn_fetch(file, holders, FetchPurpose::Download);
    }

    async fn obtain(&self, requester: PeerId, file: FileName) -> Result<FilePayload, OverlayError> {
        let Some(record) = self.record(&file) else {
            self.metrics.lock().invalid += 1;
            return Err(OverlayError::NotFound(file));
        };
        if !record.state.is_servable() {
            self.metrics.lock().invalid += 1;
            debug!(leaf = %self.id(), %requester, %file, state = ?record.state, "[ov-04] Refusing stale copy");
            return Err(OverlayError::Stale(file));
        }

        if let Some(master) = record.master().filter(|_| self.config.mode.validates_on_obtain()) {
            match self.ask_master(master, &file, record.version).await {
                Ok(true) => {}
                Ok(false) => {
                    self.metrics.lock().invalid += 1;
                    let refetch_from = self.records.write().mark_stale(&file);
                    if let Some(master) = refetch_from {
                        self.spawn_fetch(file.clone(), vec![master], FetchPurpose::Refetch);
                    }
                    debug!(leaf = %self.id(), %requester, %file, version = record.version, "[ov-04] Copy behind master");
                    return Err(OverlayError::Stale(file));
                }
                Err(err) => {
                    self.metrics.lock().invalid += 1;
                    warn!(leaf = %self.id(), %master, %file, error = %err, "[ov-04] Validation failed");
                    return Err(err);
                }
            }
        }

        let _content = self.content.read().await;
        let record = match self.record(&file) {
            Some(current) if current.state.is_servable() => current,
            _ => {
                self.metrics.lock().invalid += 1;
                return Err(OverlayError::Stale(file));
            }
        };
        let bytes = match self.store.read(&file).await {
            Ok(bytes) => bytes,
            Err(err) => {
                self.metrics.lock().invalid += 1;
                return Err(err);
            }
        };
        self.metrics.lock().served += 1;
        Ok(FilePayload {
            master: record.master_or(self.id()),
            version: record.version,
            file,
            bytes,
        })
    }

    async fn receive(&self, payload: FilePayload) -> Result<(), OverlayError> {
        let FilePayload {
            file,
            bytes,
            version,
            master,
        } = payload;

        let (outcome, retry_from) = {
            let _content = self.content.write().await;
            let planned = self.records.read().classify_receive(&file, version);
            if planned.persists() {
                if let Err(err) = self.store.write(&file, &bytes).await {
                    self.metrics.lock().invalid += 1;
                    return Err(err);
                }
            }

            let mut records = self.records.write();
            let outcome = records.apply_receive(&file, version, master);
            let retry_from = match outcome {
                ReceiveOutcome::Stale => records.retry_refetch(&file),
                _ => None,
            };
            (outcome, retry_from)
        };
        debug!(leaf = %self.id(), %file, version, ?outcome, "[ov-04] Received");
        match outcome {
            ReceiveOutcome::FirstCopy => {
                self.connections.register(master, PeerKind::Leaf);
                self.metrics.lock().valid += 1;
                self.complete_request(&file);
                self.send(
                    self.config.super_peer,
                    Request::Add {
                        leaf: self.id(),
                        file: file.clone(),
                        version,
                    },
                );
                if self.config.mode.tracks_versions() {
                    self.send(
                        self.config.super_peer,
                        Request::UpdateVersion {
                            leaf: self.id(),
                            file,
                            version,
                        },
                    );
                }
            }
            ReceiveOutcome::Revalidated => {
                self.metrics.lock().revalidated += 1;
                if self.config.mode.tracks_versions() {
                    self.send(
                        self.config.super_peer,
                        Request::UpdateVersion {
                            leaf: self.id(),
                            file,
                            version,
                        },
                    );
                }
            }
            ReceiveOutcome::Stale => {
                self.metrics.lock().invalid += 1;
                if let Some(master) = retry_from {
                    debug!(leaf = %self.id(), %file, version, "[ov-04] Refetch behind announced version");
                    self.spawn_fetch(file, vec![master], FetchPurpose::Refetch);
                }
            }
            ReceiveOutcome::Refreshed | ReceiveOutcome::Owned => {}
        }
        Ok(())
    }

    fn invalidate(&self, msg_id: MessageId, master: PeerId, file: FileName, version: Version) {
        let (action, refetch_from) = self.records.write().apply_invalidation(&file, version);
        let InvalidationAction::Invalidate { version, .. } = action else {
            trace!(leaf = %self.id(), %msg_id, %file, version, "[ov-04] Invalidation ignored");
            return;
        };

        debug!(leaf = %self.id(), %msg_id, %master, %file, version, "[ov-04] Copy invalidated");
        self.send(
            self.config.super_peer,
            Request::UpdateVersion {
                leaf: self.id(),
                file: file.clone(),
                version,
            },
        );
        if let Some(master) = refetch_from {
            self.spawn_fetch(file, vec![master], FetchPurpose::Refetch);
        }
    }

    fn up_to_date(&self, file: &FileName, version: Version) -> Result<bool, OverlayError> {
        match self.records.read().get(file) {
            Some(record) if record.is_owner() => Ok(record.version <= version),
            Some(_) => Err(OverlayError::NotOwner(file.clone())),
            None => Err(OverlayError::NotFound(file.clone())),
        }
    }

    fn file_out_of_date(&self, file: FileName) {
        let refetch_from = self.records.write().mark_stale(&file);
        if let Some(master) = refetch_from {
            debug!(leaf = %self.id(), %file, %master, "[ov-04] Out of date, refetching");
            self.spawn_fetch(file, vec![master], FetchPurpose::Refetch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MemoryBlobStore;
    use crate::domain::ReplicaState;
    use ov_01_transport::testing::RecordingTransport;
    use ov_01_transport::TransportConfig;
    use shared_types::{ConsistencyMode, FixedRandomSource, Response};

    const SUPER: PeerId = PeerId(1);
    const LEAF: PeerId = PeerId(10);
    const MASTER: PeerId = PeerId(11);

    fn leaf(mode: ConsistencyMode) -> (Arc<LeafNode>, Arc<RecordingTransport>) {
        leaf_with(LeafConfig::new(LEAF, SUPER, 3, mode), Arc::new(MemoryBlobStore::new()))
    }

    fn leaf_with(
        config: LeafConfig,
        store: Arc<dyn BlobStore>,
    ) -> (Arc<LeafNode>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        let node = LeafNode::new(
            config.with_transport(TransportConfig::for_testing()),
            transport.clone(),
            store,
            Arc::new(FixedRandomSource::first()),
        );
        (node, transport)
    }

    fn file() -> FileName {
        FileName::from("1.txt")
    }

    fn payload(version: Version) -> FilePayload {
        FilePayload {
            file: file(),
            bytes: format!("v{version}").into_bytes(),
            version,
            master: MASTER,
        }
    }

    /// Answer `obtain` with `version` of `1.txt`.
    fn serve_version(transport: &RecordingTransport, version: Version) {
        transport.respond_with(move |_, request| match request {
            Request::Obtain { .. } => Ok(Response::File(payload(version))),
            _ => Ok(Response::Ack),
        });
    }

    #[tokio::test]
    async fn test_request_files_casts_one_search_each() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        let issued = leaf.request_files(vec![file(), FileName::from("2.txt"), file()]);
        assert_eq!(issued, 2);
        assert_eq!(leaf.pending_count(), 2);

        let queries = transport.casts_of("query");
        assert_eq!(queries.len(), 2);
        assert!(queries.iter().all(|m| m.to == SUPER));
        assert_ne!(queries[0].request, queries[1].request);
    }

    #[tokio::test]
    async fn test_hit_downloads_and_registers_copy() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        serve_version(&transport, 0);
        leaf.request_files(vec![file()]);

        leaf.query_hit(file(), vec![MASTER]);
        leaf.settle().await;
        leaf.wait_complete().await;

        let record = leaf.record(&file()).unwrap();
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(record.master(), Some(MASTER));
        assert_eq!(leaf.pending_count(), 0);
        assert_eq!(leaf.metrics().valid, 1);

        let adds = transport.calls_of("add");
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].to, SUPER);
    }

    #[tokio::test]
    async fn test_second_hit_for_same_file_ignored() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        serve_version(&transport, 0);
        leaf.request_files(vec![file()]);

        leaf.query_hit(file(), vec![MASTER]);
        leaf.query_hit(file(), vec![PeerId(12)]);
        leaf.query_hit(FileName::from("unrequested.txt"), vec![PeerId(12)]);
        leaf.settle().await;

        assert_eq!(transport.calls_of("obtain").len(), 1);
    }

    #[tokio::test]
    async fn test_double_receive_decrements_pending_once() {
        let (leaf, _) = leaf(ConsistencyMode::Push);
        leaf.request_files(vec![file(), FileName::from("2.txt")]);
        assert_eq!(leaf.pending_count(), 2);

        leaf.receive(payload(0)).await.unwrap();
        leaf.receive(payload(0)).await.unwrap();

        assert_eq!(leaf.pending_count(), 1);
        assert_eq!(leaf.metrics().valid, 1);
        assert_eq!(leaf.metrics().revalidated, 0);
    }

    #[tokio::test]
    async fn test_out_of_order_invalidations_refetch_once() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        transport.fail_peer(MASTER);
        leaf.receive(payload(0)).await.unwrap();

        for version in [3, 1, 2] {
            leaf.invalidate(MessageId::new(MASTER, version), MASTER, file(), version);
        }
        leaf.settle().await;

        let record = leaf.record(&file()).unwrap();
        assert_eq!(record.version, 3);
        assert_eq!(record.state, ReplicaState::Invalid);
        assert_eq!(transport.calls_of("obtain").len(), 1);
        assert_eq!(transport.calls_of("updateVersion").len(), 1);
    }

    #[tokio::test]
    async fn test_invalidation_refetch_restores_valid() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        leaf.receive(payload(0)).await.unwrap();
        serve_version(&transport, 1);

        leaf.invalidate(MessageId::new(MASTER, 0), MASTER, file(), 1);
        assert_eq!(
            leaf.record(&file()).unwrap().state,
            ReplicaState::Refetching
        );
        leaf.settle().await;

        let record = leaf.record(&file()).unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(leaf.metrics().revalidated, 1);
    }

    #[tokio::test]
    async fn test_refetch_behind_later_invalidation_fetches_again() {
        use std::sync::atomic::AtomicU64;

        let (leaf, transport) = leaf(ConsistencyMode::Push);
        leaf.receive(payload(0)).await.unwrap();
        // The first refetch was answered before the second update landed.
        let served = Arc::new(AtomicU64::new(0));
        let counter = served.clone();
        transport.respond_with(move |_, request| match request {
            Request::Obtain { .. } => {
                let version = (counter.fetch_add(1, Ordering::SeqCst) + 1).min(2);
                Ok(Response::File(payload(version)))
            }
            _ => Ok(Response::Ack),
        });

        leaf.invalidate(MessageId::new(MASTER, 0), MASTER, file(), 1);
        leaf.invalidate(MessageId::new(MASTER, 1), MASTER, file(), 2);
        let record = leaf.record(&file()).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.state, ReplicaState::Refetching);
        leaf.settle().await;

        let record = leaf.record(&file()).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.state, ReplicaState::Valid);
        assert_eq!(transport.calls_of("obtain").len(), 2);
        assert_eq!(leaf.metrics().invalid, 1);
        assert_eq!(leaf.metrics().revalidated, 1);
    }

    #[tokio::test]
    async fn test_pull_validate_refuses_stale_copy() {
        let (leaf, transport) = leaf(ConsistencyMode::PullValidate);
        leaf.receive(payload(1)).await.unwrap();
        transport.respond_with(|_, request| match request {
            Request::UpToDate { .. } => Ok(Response::UpToDate(false)),
            Request::Obtain { .. } => Ok(Response::File(payload(2))),
            _ => Ok(Response::Ack),
        });

        let result = leaf.obtain(PeerId(12), file()).await;
        assert_eq!(result, Err(OverlayError::Stale(file())));
        assert_eq!(leaf.metrics().invalid, 1);
        assert_eq!(leaf.metrics().served, 0);

        let checks = transport.calls_of("upToDate");
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].to, MASTER);

        // Background refetch from the master restores the copy.
        leaf.settle().await;
        let record = leaf.record(&file()).unwrap();
        assert_eq!(record.version, 2);
        assert_eq!(record.state, ReplicaState::Valid);
    }

    #[tokio::test]
    async fn test_pull_validate_serves_current_copy() {
        let (leaf, transport) = leaf(ConsistencyMode::PullValidate);
        leaf.receive(payload(1)).await.unwrap();
        transport.respond_with(|_, _| Ok(Response::UpToDate(true)));

        let served = leaf.obtain(PeerId(12), file()).await.unwrap();
        assert_eq!(served.version, 1);
        assert_eq!(served.master, MASTER);
        assert_eq!(served.bytes, b"v1".to_vec());
        assert_eq!(leaf.metrics().served, 1);
    }

    #[tokio::test]
    async fn test_push_mode_serves_without_validation() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        leaf.receive(payload(0)).await.unwrap();
        assert!(leaf.obtain(PeerId(12), file()).await.is_ok());
        assert!(transport.calls_of("upToDate").is_empty());
    }

    #[tokio::test]
    async fn test_obtain_invalid_copy_is_stale() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        transport.fail_peer(MASTER);
        leaf.receive(payload(0)).await.unwrap();
        leaf.invalidate(MessageId::new(MASTER, 0), MASTER, file(), 1);

        assert_eq!(
            leaf.obtain(PeerId(12), file()).await,
            Err(OverlayError::Stale(file()))
        );
        assert_eq!(
            leaf.obtain(PeerId(12), FileName::from("missing.txt")).await,
            Err(OverlayError::NotFound(FileName::from("missing.txt")))
        );
        assert_eq!(leaf.metrics().invalid, 2);
        leaf.settle().await;
    }

    #[tokio::test]
    async fn test_owner_update_and_up_to_date_oracle() {
        let (leaf, _) = leaf(ConsistencyMode::PullValidate);
        leaf.create_file(file(), b"Created by leaf 10\n").await.unwrap();
        leaf.update_random_file().await.unwrap();
        let (updated, version) = leaf.update_random_file().await.unwrap().unwrap();
        assert_eq!(updated, file());
        assert_eq!(version, 2);

        assert_eq!(leaf.up_to_date(&file(), 1), Ok(false));
        assert_eq!(leaf.up_to_date(&file(), 2), Ok(true));

        leaf.receive(FilePayload {
            file: FileName::from("2.txt"),
            ..payload(0)
        })
        .await
        .unwrap();
        assert_eq!(
            leaf.up_to_date(&FileName::from("2.txt"), 0),
            Err(OverlayError::NotOwner(FileName::from("2.txt")))
        );
    }

    #[tokio::test]
    async fn test_push_update_floods_invalidation_through_super() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        leaf.create_file(file(), b"x").await.unwrap();
        leaf.update_random_file().await.unwrap();
        leaf.settle().await;

        let floods = transport.calls_of("invalidate");
        assert_eq!(floods.len(), 1);
        assert_eq!(floods[0].to, SUPER);
        assert!(matches!(
            floods[0].request,
            Request::Invalidate { master: LEAF, ttl: 3, version: 1, .. }
        ));
        assert!(transport.calls_of("updateVersion").is_empty());
    }

    #[tokio::test]
    async fn test_version_authority_update_reports_and_nudges() {
        let (leaf, transport) = leaf(ConsistencyMode::VersionAuthority);
        leaf.create_file(file(), b"x").await.unwrap();
        leaf.update_random_file().await.unwrap();
        leaf.settle().await;

        assert!(transport.calls_of("invalidate").is_empty());
        assert_eq!(transport.calls_of("updateVersion").len(), 1);
        assert_eq!(
            transport.casts_to(SUPER),
            vec![Request::FileOutOfDate { file: file() }]
        );
    }

    #[tokio::test]
    async fn test_update_loop_without_owned_files() {
        let (leaf, _) = leaf(ConsistencyMode::Push);
        assert_eq!(leaf.update_random_file().await, Ok(None));
        assert_eq!(leaf.run_update_loop(Duration::from_millis(1), 3).await, 0);
    }

    #[tokio::test]
    async fn test_file_out_of_date_refetches_from_master() {
        let (leaf, transport) = leaf(ConsistencyMode::VersionAuthority);
        leaf.receive(payload(0)).await.unwrap();
        serve_version(&transport, 4);

        leaf.file_out_of_date(file());
        leaf.file_out_of_date(file());
        leaf.settle().await;

        let obtains = transport.calls_of("obtain");
        assert_eq!(obtains.len(), 1);
        assert_eq!(obtains[0].to, MASTER);
        assert_eq!(leaf.record(&file()).unwrap().version, 4);
        assert_eq!(leaf.metrics().revalidated, 1);
    }

    #[tokio::test]
    async fn test_check_versions_counts_stale_copies() {
        let (leaf, transport) = leaf(ConsistencyMode::VersionAuthority);
        leaf.receive(payload(0)).await.unwrap();
        leaf.receive(FilePayload {
            file: FileName::from("2.txt"),
            ..payload(0)
        })
        .await
        .unwrap();
        transport.respond_with(|_, request| match request {
            Request::CheckVersion { file, .. } => {
                Ok(Response::UpToDate(file.as_str() != "1.txt"))
            }
            _ => Ok(Response::Ack),
        });

        assert_eq!(leaf.check_versions().await, 1);
        assert_eq!(transport.calls_of("checkVersion").len(), 2);
    }

    #[tokio::test]
    async fn test_first_success_survives_failed_holder() {
        let (leaf, transport) = leaf_with(
            LeafConfig::new(LEAF, SUPER, 3, ConsistencyMode::Push)
                .with_fetch_strategy(FetchStrategy::FirstSuccess),
            Arc::new(MemoryBlobStore::new()),
        );
        serve_version(&transport, 0);
        transport.fail_peer(PeerId(12));
        leaf.request_files(vec![file()]);

        leaf.query_hit(file(), vec![PeerId(12), MASTER]);
        leaf.settle().await;

        assert_eq!(leaf.pending_count(), 0);
        assert_eq!(leaf.metrics().invalid, 0);
    }

    #[tokio::test]
    async fn test_failed_download_allows_retry() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        transport.fail_peer(PeerId(12));
        serve_version(&transport, 0);
        leaf.request_files(vec![file()]);

        leaf.query_hit(file(), vec![PeerId(12)]);
        leaf.settle().await;
        assert_eq!(leaf.pending_count(), 1);
        assert_eq!(leaf.metrics().invalid, 1);

        leaf.query_hit(file(), vec![MASTER]);
        leaf.settle().await;
        assert_eq!(leaf.pending_count(), 0);
    }

    struct FailingStore;

    #[async_trait]
    impl BlobStore for FailingStore {
        async fn read(&self, file: &FileName) -> Result<Vec<u8>, OverlayError> {
            Err(OverlayError::NotFound(file.clone()))
        }

        async fn write(&self, _file: &FileName, _bytes: &[u8]) -> Result<(), OverlayError> {
            Err(OverlayError::Io("disk full".to_string()))
        }
    }

    /// Lands each write, then holds it open until the gate is released.
    struct GatedStore {
        inner: MemoryBlobStore,
        armed: AtomicBool,
        gate: Notify,
    }

    #[async_trait]
    impl BlobStore for GatedStore {
        async fn read(&self, file: &FileName) -> Result<Vec<u8>, OverlayError> {
            self.inner.read(file).await
        }

        async fn write(&self, file: &FileName, bytes: &[u8]) -> Result<(), OverlayError> {
            self.inner.write(file, bytes).await?;
            if self.armed.load(Ordering::SeqCst) {
                self.gate.notified().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_obtain_during_update_serves_matching_version() {
        let store = Arc::new(GatedStore {
            inner: MemoryBlobStore::new(),
            armed: AtomicBool::new(false),
            gate: Notify::new(),
        });
        let (leaf, _) = leaf_with(
            LeafConfig::new(LEAF, SUPER, 3, ConsistencyMode::None),
            store.clone(),
        );
        leaf.create_file(file(), b"first\n").await.unwrap();
        store.armed.store(true, Ordering::SeqCst);

        let updating = tokio::spawn({
            let leaf = leaf.clone();
            async move { leaf.update_random_file().await }
        });
        tokio::task::yield_now().await;
        let obtaining = tokio::spawn({
            let leaf = leaf.clone();
            async move { leaf.obtain(PeerId(30), file()).await }
        });
        tokio::task::yield_now().await;
        store.gate.notify_one();

        assert_eq!(updating.await.unwrap().unwrap(), Some((file(), 1)));
        let served = obtaining.await.unwrap().unwrap();
        assert_eq!(served.version, 1);
        assert!(String::from_utf8_lossy(&served.bytes).contains("\nVersion 1\n"));
    }

    #[tokio::test]
    async fn test_store_failure_counts_invalid() {
        let (leaf, _) = leaf_with(
            LeafConfig::new(LEAF, SUPER, 3, ConsistencyMode::Push),
            Arc::new(FailingStore),
        );
        leaf.request_files(vec![file()]);

        let err = leaf.receive(payload(0)).await.unwrap_err();
        assert!(matches!(err, OverlayError::Io(_)));
        assert_eq!(leaf.metrics().invalid, 1);
        assert_eq!(leaf.pending_count(), 1);
        assert!(leaf.record(&file()).is_none());
    }

    #[tokio::test]
    async fn test_lifecycle_reports_to_coordinator() {
        let (leaf, transport) = leaf_with(
            LeafConfig::new(LEAF, SUPER, 3, ConsistencyMode::Push)
                .with_coordinator(PeerId::COORDINATOR),
            Arc::new(MemoryBlobStore::new()),
        );
        leaf.create_file(file(), b"x").await.unwrap();
        leaf.join_overlay().await.unwrap();

        assert_eq!(transport.calls_of("ping").len(), 1);
        assert_eq!(transport.calls_of("add").len(), 1);
        assert_eq!(transport.calls_of("ready").len(), 1);

        leaf.start();
        leaf.wait_start().await;
        leaf.report_complete().await.unwrap();
        leaf.report_metrics().await.unwrap();
        let complete = transport.calls_of("complete");
        assert_eq!(complete[0].to, PeerId::COORDINATOR);
        assert_eq!(transport.calls_of("metrics").len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_joins_downloads() {
        let (leaf, transport) = leaf(ConsistencyMode::Push);
        serve_version(&transport, 0);
        leaf.request_files(vec![file()]);
        leaf.query_hit(file(), vec![MASTER]);

        leaf.shutdown().await;
        assert!(leaf.record(&file()).is_some());
    }
}
