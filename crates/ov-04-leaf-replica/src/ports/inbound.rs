//! Inbound port for the leaf replica manager: the RPCs a leaf serves.

use async_trait::async_trait;
use shared_types::{FileName, FilePayload, MessageId, OverlayError, PeerId, Version};

#[async_trait]
pub trait LeafReplicaApi: Send + Sync {
    /// A search result arrived; start downloading if the file is wanted.
    fn query_hit(&self, file: FileName, holders: Vec<PeerId>);

    /// Serve a copy of `file` to `requester`.
    async fn obtain(&self, requester: PeerId, file: FileName) -> Result<FilePayload, OverlayError>;

    /// Store a downloaded copy.
    async fn receive(&self, payload: FilePayload) -> Result<(), OverlayError>;

    /// The owner of `file` published `version`.
    fn invalidate(&self, msg_id: MessageId, master: PeerId, file: FileName, version: Version);

    /// Owner-side oracle: is a caller holding `version` current?
    fn up_to_date(&self, file: &FileName, version: Version) -> Result<bool, OverlayError>;

    /// The super believes our copy of `file` is behind.
    fn file_out_of_date(&self, file: FileName);
}
