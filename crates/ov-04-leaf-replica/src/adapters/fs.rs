//! Filesystem blob store: one directory per leaf, one file per name.

use crate::ports::outbound::BlobStore;
use async_trait::async_trait;
use shared_types::{FileName, OverlayError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, file: &FileName) -> Result<PathBuf, OverlayError> {
        let name = file.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(OverlayError::Io(format!("invalid file name: {name:?}")));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn read(&self, file: &FileName) -> Result<Vec<u8>, OverlayError> {
        let path = self.path_of(file)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(OverlayError::NotFound(file.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn write(&self, file: &FileName, bytes: &[u8]) -> Result<(), OverlayError> {
        let path = self.path_of(file)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), len = bytes.len(), "[ov-04] Blob written");
        Ok(())
    }
}
