//! In-memory storage backend.
//!
//! Holds every object in a mutex-guarded map. Used by tests and by embedders that want a
//! throwaway backend; contents are lost when the last clone is dropped.

use crate::keys::validate_key;
use crate::traits::{ByteReader, ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::io::AsyncReadExt;

/// Chunk size used when replaying an object as a stream.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Storage implementation that keeps objects in memory
#[derive(Clone, Default, Debug)]
pub struct MemoryStorage {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, HashMap<String, Bytes>> {
        self.files
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Place an object directly, bypassing `write` (test setup)
    pub fn insert(&self, key: &str, data: impl Into<Bytes>) {
        self.files().insert(key.to_string(), data.into());
    }

    /// Get object data (for test assertions)
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.files().get(key).cloned()
    }

    /// All stored keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.files().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    fn lookup(&self, key: &str) -> StorageResult<Bytes> {
        validate_key(key)?;
        self.get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        Ok(self.lookup(key)?.to_vec())
    }

    async fn read_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let data = self.lookup(key)?;
        let chunks: Vec<Result<Bytes, StorageError>> = (0..data.len())
            .step_by(STREAM_CHUNK_SIZE)
            .map(|offset| {
                let end = (offset + STREAM_CHUNK_SIZE).min(data.len());
                Ok(data.slice(offset..end))
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn write(&self, key: &str, mut reader: ByteReader) -> StorageResult<u64> {
        validate_key(key)?;

        let mut buffer = Vec::new();
        reader
            .read_to_end(&mut buffer)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Failed to read from stream: {}", e)))?;

        let size = buffer.len() as u64;
        self.files().insert(key.to_string(), Bytes::from(buffer));

        tracing::debug!(key = %key, size_bytes = size, "Memory storage write successful");
        Ok(size)
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        validate_key(key)?;
        self.files().remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        validate_key(key)?;
        Ok(self.files().contains_key(key))
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        Ok(self.lookup(key)?.len() as u64)
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        validate_key(to_key)?;
        let data = self.lookup(from_key)?;
        self.files().insert(to_key.to_string(), data);
        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }
}
