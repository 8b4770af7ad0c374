//! In-memory blob store.

use crate::ports::outbound::BlobStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{FileName, OverlayError};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<FileName, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, file: &FileName) -> Result<Vec<u8>, OverlayError> {
        self.blobs
            .read()
            .get(file)
            .cloned()
            .ok_or_else(|| OverlayError::NotFound(file.clone()))
    }

    async fn write(&self, file: &FileName, bytes: &[u8]) -> Result<(), OverlayError> {
        self.blobs.write().insert(file.clone(), bytes.to_vec());
        Ok(())
    }
}
