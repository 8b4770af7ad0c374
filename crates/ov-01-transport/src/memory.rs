//! # In-Process Network
//!
//! [`Transport`] implementation that delivers requests to endpoints living in
//! the same process. Each registered endpoint owns a fixed-size worker pool
//! (a semaphore) that bounds how many of its handlers run at once, matching a
//! server started with N worker threads.
//!
//! Fire-and-forget deliveries run as tasks tracked by the network's own
//! [`TaskSet`] so a simulation can drain in-flight traffic before teardown.

use crate::ports::inbound::Endpoint;
use crate::ports::outbound::Transport;
use crate::tasks::TaskSet;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{OverlayError, PeerId, Request, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, trace, warn};

/// Registered callee.
#[derive(Clone)]
struct Registration {
    endpoint: Arc<dyn Endpoint>,
    workers: Arc<Semaphore>,
    online: Arc<AtomicBool>,
}

/// Delivery counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkStats {
    pub calls: u64,
    pub casts: u64,
    pub failures: u64,
}

/// Addressable endpoints in one process.
pub struct InMemoryNetwork {
    endpoints: RwLock<HashMap<PeerId, Registration>>,
    deliveries: TaskSet,
    calls: AtomicU64,
    casts: AtomicU64,
    failures: AtomicU64,
}

impl Default for InMemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryNetwork {
    pub fn new() -> Self {
        Self {
            endpoints: RwLock::new(HashMap::new()),
            deliveries: TaskSet::new(),
            calls: AtomicU64::new(0),
            casts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Bind `endpoint` to `peer` with a pool of `workers` concurrent handlers.
    ///
    /// Re-registering a peer replaces its endpoint.
    pub fn register(&self, peer: PeerId, endpoint: Arc<dyn Endpoint>, workers: usize) {
        let registration = Registration {
            endpoint,
            workers: Arc::new(Semaphore::new(workers.max(1))),
            online: Arc::new(AtomicBool::new(true)),
        };
        self.endpoints.write().insert(peer, registration);
        debug!(%peer, workers, "Endpoint registered");
    }

    /// Remove `peer`; later calls fail with `UnknownPeer`.
    pub fn deregister(&self, peer: PeerId) {
        if let Some(registration) = self.endpoints.write().remove(&peer) {
            registration.workers.close();
        }
    }

    /// Simulate a failed peer: calls are refused until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, peer: PeerId) {
        if let Some(registration) = self.endpoints.read().get(&peer) {
            registration.online.store(false, Ordering::Release);
        }
    }

    pub fn reconnect(&self, peer: PeerId) {
        if let Some(registration) = self.endpoints.read().get(&peer) {
            registration.online.store(true, Ordering::Release);
        }
    }

    pub fn is_registered(&self, peer: PeerId) -> bool {
        self.endpoints.read().contains_key(&peer)
    }

    pub fn stats(&self) -> NetworkStats {
        NetworkStats {
            calls: self.calls.load(Ordering::Relaxed),
            casts: self.casts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    /// Wait until every in-flight cast, and every cast those casts caused,
    /// has been handled.
    pub async fn settle(&self) {
        self.deliveries.join_all().await;
    }

    /// Wait for every in-flight cast, then refuse new ones.
    pub async fn drain(&self) {
        self.deliveries.shutdown().await;
    }

    fn lookup(&self, peer: PeerId) -> Result<Registration, OverlayError> {
        let registration = self
            .endpoints
            .read()
            .get(&peer)
            .cloned()
            .ok_or(OverlayError::UnknownPeer(peer))?;
        if !registration.online.load(Ordering::Acquire) {
            return Err(OverlayError::ConnectionRefused { peer });
        }
        Ok(registration)
    }

    async fn deliver(
        registration: Registration,
        from: PeerId,
        to: PeerId,
        request: Request,
    ) -> Result<Response, OverlayError> {
        let _permit = registration
            .workers
            .acquire_owned()
            .await
            .map_err(|_| OverlayError::ConnectionRefused { peer: to })?;
        registration.endpoint.handle(from, request).await
    }
}

#[async_trait]
impl Transport for InMemoryNetwork {
    async fn call(
        &self,
        from: PeerId,
        to: PeerId,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, OverlayError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        trace!(%from, %to, method, "call");

        let result = match self.lookup(to) {
            Ok(registration) => {
                match tokio::time::timeout(timeout, Self::deliver(registration, from, to, request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(OverlayError::Timeout { peer: to }),
                }
            }
            Err(err) => Err(err),
        };
        if matches!(&result, Err(err) if err.is_transport()) {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn cast(&self, from: PeerId, to: PeerId, request: Request) {
        self.casts.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        let registration = match self.lookup(to) {
            Ok(registration) => registration,
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                warn!(%from, %to, method, error = %err, "cast dropped");
                return;
            }
        };
        let spawned = self.deliveries.spawn(async move {
            if let Err(err) = Self::deliver(registration, from, to, request).await {
                debug!(%from, %to, method, error = %err, "cast handler failed");
            }
        });
        if !spawned {
            debug!(%from, %to, method, "cast dropped: network drained");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Endpoint counting requests and the peak number of concurrent handlers.
    #[derive(Default)]
    struct SlowEndpoint {
        handled: AtomicUsize,
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Endpoint for SlowEndpoint {
        async fn handle(&self, _from: PeerId, request: Request) -> Result<Response, OverlayError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            self.handled.fetch_add(1, Ordering::SeqCst);
            match request {
                Request::UpToDate { version, .. } => Ok(Response::UpToDate(version > 0)),
                _ => Ok(Response::Ack),
            }
        }
    }

    #[tokio::test]
    async fn test_call_reaches_endpoint() {
        let network = InMemoryNetwork::new();
        let endpoint = Arc::new(SlowEndpoint::default());
        network.register(PeerId(1), endpoint.clone(), 4);

        let response = network
            .call(
                PeerId(2),
                PeerId(1),
                Request::UpToDate {
                    file: "a".into(),
                    version: 1,
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(response, Response::UpToDate(true));
        assert_eq!(endpoint.handled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_and_disconnected_peers() {
        let network = InMemoryNetwork::new();
        network.register(PeerId(1), Arc::new(SlowEndpoint::default()), 1);

        let unknown = network
            .call(PeerId(0), PeerId(9), Request::Ping, Duration::from_secs(1))
            .await;
        assert_eq!(unknown, Err(OverlayError::UnknownPeer(PeerId(9))));

        network.disconnect(PeerId(1));
        let refused = network
            .call(PeerId(0), PeerId(1), Request::Ping, Duration::from_secs(1))
            .await;
        assert_eq!(refused, Err(OverlayError::ConnectionRefused { peer: PeerId(1) }));
        assert_eq!(network.stats().failures, 2);

        network.reconnect(PeerId(1));
        assert!(network
            .call(PeerId(0), PeerId(1), Request::Ping, Duration::from_secs(1))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_call_timeout() {
        let network = InMemoryNetwork::new();
        network.register(PeerId(1), Arc::new(SlowEndpoint::default()), 1);
        let result = network
            .call(PeerId(0), PeerId(1), Request::Ping, Duration::from_millis(1))
            .await;
        assert_eq!(result, Err(OverlayError::Timeout { peer: PeerId(1) }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_worker_pool_bounds_concurrency() {
        let network = InMemoryNetwork::new();
        let endpoint = Arc::new(SlowEndpoint::default());
        network.register(PeerId(1), endpoint.clone(), 4);

        for _ in 0..12 {
            network.cast(PeerId(0), PeerId(1), Request::Ping);
        }
        network.drain().await;

        assert_eq!(endpoint.handled.load(Ordering::SeqCst), 12);
        assert!(endpoint.peak.load(Ordering::SeqCst) <= 4);
        assert_eq!(network.stats().casts, 12);
    }
}
