//! Inbound port for the super-peer index.
//!
//! Each method corresponds to one RPC. Methods return once local state is
//! updated; any resulting forwards are sent in the background.

use crate::domain::{IndexSnapshot, VersionVerdict};
use shared_types::{FileName, MessageId, PeerId, Version};

pub trait SuperPeerApi: Send + Sync {
    /// Register `leaf` as a holder of `file`.
    fn add(&self, leaf: PeerId, file: FileName, version: Version);

    /// Relay a search and answer it from the local index.
    fn query(&self, sender: PeerId, msg_id: MessageId, ttl: u32, file: FileName);

    /// Relay a search reply along the reverse path.
    fn query_hit(
        &self,
        sender: PeerId,
        msg_id: MessageId,
        ttl: u32,
        file: FileName,
        holders: Vec<PeerId>,
    );

    /// Flood an invalidation to children and neighbor supers.
    fn invalidate(
        &self,
        msg_id: MessageId,
        master: PeerId,
        ttl: u32,
        file: FileName,
        version: Version,
    );

    /// Record a holder's best-known version.
    fn update_version(&self, leaf: PeerId, file: FileName, version: Version);

    /// Tell `sender` whether a newer version of `file` exists.
    fn check_version(&self, sender: PeerId, file: FileName, version: Version) -> VersionVerdict;

    /// Nudge every known holder of `file` to revalidate.
    fn file_out_of_date(&self, from: PeerId, file: FileName);

    fn dump_index(&self) -> IndexSnapshot;
}
