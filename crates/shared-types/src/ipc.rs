//! # RPC Payloads
//!
//! The conceptual RPC surface exposed by super-peers, leaves and the
//! coordinator. One [`Request`] variant per remote method.
//!
//! ## Method Table
//!
//! | Method | Callee | Purpose |
//! |---|---|---|
//! | `Query` | Super | initiate/relay search |
//! | `QueryHit` | Super, Leaf | relay/deliver search result |
//! | `Invalidate` | Super, Leaf | flood staleness notice |
//! | `Add` | Super | register a replica holder |
//! | `UpdateVersion` | Super | report best-known version |
//! | `CheckVersion` | Super | ask whether a newer version exists |
//! | `FileOutOfDate` | Leaf, Super | prompt revalidation |
//! | `Obtain` | Leaf (holder) | request file bytes |
//! | `Receive` | Leaf (requester) | deliver file bytes |
//! | `UpToDate` | Leaf (owner) | staleness oracle |
//! | `Ping` | any | liveness check |
//! | `Ready`/`Start`/`Complete`/`Metrics`/`End` | run lifecycle | |

use crate::entities::{FileName, MessageId, PeerId, Version};
use crate::errors::OverlayError;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// File bytes plus the version and master they belong to.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePayload {
    pub file: FileName,
    #[serde_as(as = "Bytes")]
    pub bytes: Vec<u8>,
    pub version: Version,
    /// Peer authoritative for this file's version (usually the owner).
    pub master: PeerId,
}

/// A remote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Query {
        sender: PeerId,
        msg_id: MessageId,
        ttl: u32,
        file: FileName,
    },
    QueryHit {
        sender: PeerId,
        msg_id: MessageId,
        ttl: u32,
        file: FileName,
        holders: Vec<PeerId>,
    },
    Invalidate {
        msg_id: MessageId,
        master: PeerId,
        ttl: u32,
        file: FileName,
        version: Version,
    },
    Add {
        leaf: PeerId,
        file: FileName,
        version: Version,
    },
    UpdateVersion {
        leaf: PeerId,
        file: FileName,
        version: Version,
    },
    CheckVersion {
        sender: PeerId,
        file: FileName,
        version: Version,
    },
    FileOutOfDate {
        file: FileName,
    },
    Obtain {
        requester: PeerId,
        file: FileName,
    },
    Receive(FilePayload),
    UpToDate {
        file: FileName,
        version: Version,
    },
    Ping,
    /// Child is registered and ready (leaf → super, super → coordinator).
    Ready {
        peer: PeerId,
    },
    /// Coordinator → leaf: begin issuing searches.
    Start,
    /// Leaf → coordinator: every requested file has arrived.
    Complete {
        peer: PeerId,
    },
    /// Leaf → coordinator: final replica counters.
    Metrics {
        peer: PeerId,
        valid: u64,
        invalid: u64,
    },
    /// Coordinator → any: stop the run.
    End,
}

impl Request {
    /// Method name for logs.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Query { .. } => "query",
            Self::QueryHit { .. } => "queryHit",
            Self::Invalidate { .. } => "invalidate",
            Self::Add { .. } => "add",
            Self::UpdateVersion { .. } => "updateVersion",
            Self::CheckVersion { .. } => "checkVersion",
            Self::FileOutOfDate { .. } => "fileOutOfDate",
            Self::Obtain { .. } => "obtain",
            Self::Receive(_) => "receive",
            Self::UpToDate { .. } => "upToDate",
            Self::Ping => "ping",
            Self::Ready { .. } => "ready",
            Self::Start => "start",
            Self::Complete { .. } => "complete",
            Self::Metrics { .. } => "metrics",
            Self::End => "end",
        }
    }
}

/// Answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ack,
    File(FilePayload),
    UpToDate(bool),
}

impl Response {
    pub fn into_file(self) -> Result<FilePayload, OverlayError> {
        match self {
            Self::File(payload) => Ok(payload),
            _ => Err(OverlayError::unexpected("file payload")),
        }
    }

    pub fn into_up_to_date(self) -> Result<bool, OverlayError> {
        match self {
            Self::UpToDate(fresh) => Ok(fresh),
            _ => Err(OverlayError::unexpected("upToDate answer")),
        }
    }
}
