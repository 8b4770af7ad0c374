//! Outbound port: the RPC substrate.

use async_trait::async_trait;
use shared_types::{OverlayError, PeerId, Request, Response};
use std::time::Duration;

/// Addressable-endpoint RPC substrate.
///
/// # Contract
///
/// - `call` is synchronous from the caller's view and bounded by `timeout`.
/// - `cast` is fire-and-forget: it returns immediately and failures are only
///   logged by the transport.
/// - Neither guarantees at-least-once delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Call `to` and wait for its answer.
    async fn call(
        &self,
        from: PeerId,
        to: PeerId,
        request: Request,
        timeout: Duration,
    ) -> Result<Response, OverlayError>;

    /// Deliver `request` to `to` without waiting.
    fn cast(&self, from: PeerId, to: PeerId, request: Request);
}
