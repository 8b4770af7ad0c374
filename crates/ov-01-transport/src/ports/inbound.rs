//! Inbound port: the server side of a node.

use async_trait::async_trait;
use shared_types::{OverlayError, PeerId, Request, Response};

/// A node accepting remote calls.
///
/// Handlers run concurrently (bounded by the callee's worker pool) and must
/// guard their own shared state.
#[async_trait]
pub trait Endpoint: Send + Sync {
    /// Serve one request from `from`.
    async fn handle(&self, from: PeerId, request: Request) -> Result<Response, OverlayError>;
}
