//! # Coordinator Endpoint
//!
//! Peer `0`. Collects `ready` from supers, `complete` from leaves and the
//! final `metrics` reports. Each signal counts once per peer.

use async_trait::async_trait;
use ov_01_transport::Endpoint;
use parking_lot::Mutex;
use shared_types::{OverlayError, PeerId, Request, Response};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::Notify;
use tracing::{debug, info};

/// Aggregated `(valid, invalid)` counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricTotals {
    pub valid: u64,
    pub invalid: u64,
}

impl MetricTotals {
    /// Share of invalid outcomes, in percent.
    pub fn invalid_percent(&self) -> f64 {
        let total = self.valid + self.invalid;
        if total == 0 {
            0.0
        } else {
            self.invalid as f64 / total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
struct Signals {
    ready: BTreeSet<PeerId>,
    complete: BTreeSet<PeerId>,
    metrics: BTreeMap<PeerId, MetricTotals>,
}

#[derive(Debug, Default)]
pub struct Coordinator {
    signals: Mutex<Signals>,
    changed: Notify,
}

impl Coordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready_count(&self) -> usize {
        self.signals.lock().ready.len()
    }

    pub fn complete_count(&self) -> usize {
        self.signals.lock().complete.len()
    }

    pub fn completed(&self) -> BTreeSet<PeerId> {
        self.signals.lock().complete.clone()
    }

    pub fn metrics_count(&self) -> usize {
        self.signals.lock().metrics.len()
    }

    pub fn totals(&self) -> MetricTotals {
        self.signals
            .lock()
            .metrics
            .values()
            .fold(MetricTotals::default(), |sum, report| MetricTotals {
                valid: sum.valid + report.valid,
                invalid: sum.invalid + report.invalid,
            })
    }

    pub async fn wait_ready(&self, expected: usize) {
        self.wait_until(|| self.ready_count() >= expected).await;
    }

    pub async fn wait_complete(&self, expected: usize) {
        self.wait_until(|| self.complete_count() >= expected).await;
    }

    pub async fn wait_metrics(&self, expected: usize) {
        self.wait_until(|| self.metrics_count() >= expected).await;
    }

    async fn wait_until(&self, done: impl Fn() -> bool) {
        loop {
            let notified = self.changed.notified();
            if done() {
                return;
            }
            notified.await;
        }
    }

    fn record(&self, update: impl FnOnce(&mut Signals) -> bool) {
        let changed = update(&mut *self.signals.lock());
        if changed {
            self.changed.notify_waiters();
        }
    }
}

#[async_trait]
impl Endpoint for Coordinator {
    async fn handle(&self, from: PeerId, request: Request) -> Result<Response, OverlayError> {
        match request {
            Request::Ready { peer } => {
                info!(%peer, "[coordinator] Super ready");
                self.record(|signals| signals.ready.insert(peer));
            }
            Request::Complete { peer } => {
                info!(%peer, "[coordinator] Leaf complete");
                self.record(|signals| signals.complete.insert(peer));
            }
            Request::Metrics {
                peer,
                valid,
                invalid,
            } => {
                debug!(%peer, valid, invalid, "[coordinator] Metrics received");
                self.record(|signals| {
                    signals
                        .metrics
                        .insert(peer, MetricTotals { valid, invalid })
                        .is_none()
                });
            }
            Request::Ping => {}
            other => {
                debug!(%from, method = other.method(), "[coordinator] Unsupported request");
                return Err(OverlayError::Unsupported {
                    method: other.method().to_string(),
                    node: "coordinator".to_string(),
                });
            }
        }
        Ok(Response::Ack)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signals_count_once_per_peer() {
        let coordinator = Coordinator::new();
        for _ in 0..2 {
            coordinator
                .handle(PeerId(1), Request::Ready { peer: PeerId(1) })
                .await
                .unwrap();
        }
        assert_eq!(coordinator.ready_count(), 1);

        for (peer, valid, invalid) in [(4, 3, 1), (5, 2, 0), (4, 3, 1)] {
            coordinator
                .handle(
                    PeerId(peer),
                    Request::Metrics {
                        peer: PeerId(peer),
                        valid,
                        invalid,
                    },
                )
                .await
                .unwrap();
        }
        let totals = coordinator.totals();
        assert_eq!(totals, MetricTotals { valid: 5, invalid: 1 });
        assert!((totals.invalid_percent() - 100.0 / 6.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_wait_complete_wakes_on_last_leaf() {
        let coordinator = Arc::new(Coordinator::new());
        let waiter = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.wait_complete(2).await })
        };
        for peer in [PeerId(4), PeerId(5)] {
            coordinator
                .handle(peer, Request::Complete { peer })
                .await
                .unwrap();
        }
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(coordinator.completed().len(), 2);
    }

    #[tokio::test]
    async fn test_leaf_methods_rejected() {
        let coordinator = Coordinator::new();
        let err = coordinator.handle(PeerId(1), Request::Start).await.unwrap_err();
        assert!(matches!(err, OverlayError::Unsupported { .. }));
        assert_eq!(MetricTotals::default().invalid_percent(), 0.0);
    }
}
