//! RPC dispatch for the leaf node.

use crate::ports::inbound::LeafReplicaApi;
use crate::service::LeafNode;
use async_trait::async_trait;
use ov_01_transport::Endpoint;
use shared_types::{OverlayError, PeerId, Request, Response};
use tracing::trace;

#[async_trait]
impl Endpoint for LeafNode {
    async fn handle(&self, from: PeerId, request: Request) -> Result<Response, OverlayError> {
        trace!(node = %self.id(), %from, method = request.method(), "[ov-04] Request");
        match request {
            Request::QueryHit { file, holders, .. } => self.query_hit(file, holders),
            Request::Obtain { requester, file } => {
                return self.obtain(requester, file).await.map(Response::File);
            }
            Request::Receive(payload) => self.receive(payload).await?,
            Request::Invalidate {
                msg_id,
                master,
                file,
                version,
                ..
            } => self.invalidate(msg_id, master, file, version),
            Request::UpToDate { file, version } => {
                return self.up_to_date(&file, version).map(Response::UpToDate);
            }
            Request::FileOutOfDate { file } => self.file_out_of_date(file),
            Request::Start => self.start(),
            Request::End => self.end(),
            Request::Ping => {}
            other => {
                return Err(OverlayError::Unsupported {
                    method: other.method().to_string(),
                    node: "leaf".to_string(),
                })
            }
        }
        Ok(Response::Ack)
    }
}
