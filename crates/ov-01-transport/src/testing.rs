//! Centralized Testing Utilities
//!
//! [`RecordingTransport`] captures every outbound call and cast so unit tests
//! can assert exactly what a node sent, without running peers. Available with
//! the `test-utils` feature.

use crate::ports::outbound::Transport;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{OverlayError, PeerId, Request, Response};
use std::collections::HashSet;
use std::time::Duration;

/// One captured outbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentMessage {
    pub from: PeerId,
    pub to: PeerId,
    pub request: Request,
}

type Responder = Box<dyn Fn(PeerId, &Request) -> Result<Response, OverlayError> + Send + Sync>;

/// Transport that records instead of delivering.
///
/// Calls are answered by the installed responder (default: `Ack`);
/// peers marked with [`fail_peer`](Self::fail_peer) refuse every call.
#[derive(Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<SentMessage>>,
    casts: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<PeerId>>,
    responder: Mutex<Option<Responder>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls with `responder`.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: Fn(PeerId, &Request) -> Result<Response, OverlayError> + Send + Sync + 'static,
    {
        *self.responder.lock() = Some(Box::new(responder));
    }

    /// Refuse every call to `peer`.
    pub fn fail_peer(&self, peer: PeerId) {
        self.failing.lock().insert(peer);
    }

    pub fn calls(&self) -> Vec<SentMessage> {
        self.calls.lock().clone()
    }

    pub fn casts(&self) -> Vec<SentMessage> {
        self.casts.lock().clone()
    }

    /// Casts addressed to `peer`.
    pub fn casts_to(&self, peer: PeerId) -> Vec<Request> {
        self.casts
            .lock()
            .iter()
            .filter(|m| m.to == peer)
            .map(|m| m.request.clone())
            .collect()
    }

    /// Casts of one method, in send order.
    pub fn casts_of(&self, method: &str) -> Vec<SentMessage> {
        self.casts
            .lock()
            .iter()
            .filter(|m| m.request.method() == method)
            .cloned()
            .collect()
    }

    /// Calls of one method, in send order.
    pub fn calls_of(&self, method: &str) -> Vec<SentMessage> {
        self.calls
            .lock()
            .iter()
            .filter(|m| m.request.method() == method)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
        self.casts.lock().clear();
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn call(
        &self,
        from: PeerId,
        to: PeerId,
        request: Request,
        _timeout: Duration,
    ) -> Result<Response, OverlayError> {
        let answer = if self.failing.lock().contains(&to) {
            Err(OverlayError::ConnectionRefused { peer: to })
        } else {
            match self.responder.lock().as_ref() {
                Some(responder) => responder(to, &request),
                None => Ok(Response::Ack),
            }
        };
        self.calls.lock().push(SentMessage { from, to, request });
        answer
    }

    fn cast(&self, from: PeerId, to: PeerId, request: Request) {
        self.casts.lock().push(SentMessage { from, to, request });
    }
}
