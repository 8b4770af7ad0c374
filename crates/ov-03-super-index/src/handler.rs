//! RPC dispatch for the super-peer node.

use crate::ports::inbound::SuperPeerApi;
use crate::service::SuperPeerNode;
use async_trait::async_trait;
use ov_01_transport::Endpoint;
use shared_types::{OverlayError, PeerId, Request, Response};
use tracing::trace;

#[async_trait]
impl Endpoint for SuperPeerNode {
    async fn handle(&self, from: PeerId, request: Request) -> Result<Response, OverlayError> {
        trace!(node = %self.id(), %from, method = request.method(), "[ov-03] Request");
        match request {
            Request::Query {
                sender,
                msg_id,
                ttl,
                file,
            } => self.query(sender, msg_id, ttl, file),
            Request::QueryHit {
                sender,
                msg_id,
                ttl,
                file,
                holders,
            } => self.query_hit(sender, msg_id, ttl, file, holders),
            Request::Invalidate {
                msg_id,
                master,
                ttl,
                file,
                version,
            } => self.invalidate(msg_id, master, ttl, file, version),
            Request::Add {
                leaf,
                file,
                version,
            } => self.add(leaf, file, version),
            Request::UpdateVersion {
                leaf,
                file,
                version,
            } => self.update_version(leaf, file, version),
            Request::CheckVersion {
                sender,
                file,
                version,
            } => {
                let verdict = self.check_version(sender, file, version);
                return Ok(Response::UpToDate(verdict.is_current()));
            }
            Request::FileOutOfDate { file } => self.file_out_of_date(from, file),
            Request::Ready { peer } => self.child_ready(peer),
            Request::End => self.end(),
            Request::Ping => {}
            other => {
                return Err(OverlayError::Unsupported {
                    method: other.method().to_string(),
                    node: "super".to_string(),
                })
            }
        }
        Ok(Response::Ack)
    }
}
