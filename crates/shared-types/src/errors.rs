//! # Error Types
//!
//! Defines the error taxonomy shared by every overlay node.
//!
//! Errors fall into four groups:
//!
//! - **Transport**: timeouts, refused connections, unknown endpoints.
//! - **Protocol**: a deliberate `Stale` answer from a holder.
//! - **Local I/O**: reading or writing file bytes failed.
//! - **Misuse**: a request reached a node that does not serve it.

use crate::entities::{FileName, PeerId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by remote calls and local handlers.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum OverlayError {
    /// The callee did not answer within the call timeout.
    #[error("Call to peer {peer} timed out")]
    Timeout { peer: PeerId },

    /// The callee is not accepting calls.
    #[error("Connection to peer {peer} refused")]
    ConnectionRefused { peer: PeerId },

    /// No endpoint is registered for this peer id.
    #[error("Unknown peer: {0}")]
    UnknownPeer(PeerId),

    /// The holder's copy is out of date and was not served.
    #[error("File out of date: {0}")]
    Stale(FileName),

    /// The callee holds no copy of the file.
    #[error("File not found: {0}")]
    NotFound(FileName),

    /// Version oracle asked of a peer that does not own the file.
    #[error("Not the owner of {0}")]
    NotOwner(FileName),

    /// Reading or writing file bytes failed.
    #[error("File I/O error: {0}")]
    Io(String),

    /// The callee answered with a response of the wrong shape.
    #[error("Unexpected response: expected {expected}")]
    UnexpectedResponse { expected: String },

    /// The request is not served by this kind of node.
    #[error("Method {method} not served by {node}")]
    Unsupported { method: String, node: String },

    /// The node is shutting down.
    #[error("Node is shutting down")]
    Shutdown,
}

impl OverlayError {
    /// Transport faults, as opposed to protocol-level answers.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::ConnectionRefused { .. } | Self::UnknownPeer(_)
        )
    }

    /// Deliberate "file out of date" answer.
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    pub fn unexpected(expected: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            expected: expected.into(),
        }
    }
}

impl From<std::io::Error> for OverlayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
