//! Outbound ports for the leaf replica manager.

use async_trait::async_trait;
use shared_types::{FileName, OverlayError};

/// Byte storage for a leaf's files.
///
/// Implementations map local failures to [`OverlayError::Io`] and a missing
/// file to [`OverlayError::NotFound`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn read(&self, file: &FileName) -> Result<Vec<u8>, OverlayError>;

    /// Replace the stored bytes of `file`.
    async fn write(&self, file: &FileName, bytes: &[u8]) -> Result<(), OverlayError>;
}
