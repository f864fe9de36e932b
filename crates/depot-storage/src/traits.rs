//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Remove failed: {0}")]
    RemoveFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked content of a stored object.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Source of bytes for a write. Consumed until EOF.
pub type ByteReader = Pin<Box<dyn AsyncRead + Send + Unpin>>;

/// Storage abstraction trait
///
/// All storage backends (local filesystem, memory, S3, Azure) implement this trait, keyed by
/// logical pathname. Failures are reported as-is: no backend in this crate retries beyond
/// what its client library does internally.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a whole object into memory
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Read an object as a stream of chunks (for large files)
    async fn read_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Write an object from a reader, creating parent directories as needed.
    ///
    /// Overwrites any object already stored under `key`. Returns the number of bytes written.
    async fn write(&self, key: &str, reader: ByteReader) -> StorageResult<u64>;

    /// Remove an object. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object
    async fn content_length(&self, key: &str) -> StorageResult<u64>;

    /// Copy an object from one key to another, overwriting the target
    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
