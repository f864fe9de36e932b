//! Durable record lookup, owned by the caller's persistence layer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use depot_core::FileRecord;
use futures::stream::{self, BoxStream, StreamExt};

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(String),

    #[error("record type {0} is not managed by this repository")]
    UnsupportedRecord(String),

    #[error("record {0} has no identity")]
    MissingIdentity(String),
}

/// Lazily produced records, single pass.
pub type RecordStream<'a> = BoxStream<'a, Result<Arc<dyn FileRecord>, RepositoryError>>;

#[async_trait]
pub trait FileRepository: Send + Sync {
    /// A durable record holding the same content, if any.
    async fn find_by_hash_and_size(
        &self,
        content_hash: &str,
        size_bytes: u64,
    ) -> Result<Option<Arc<dyn FileRecord>>, RepositoryError>;

    /// Every record, streamed for maintenance jobs.
    fn find_all_for_batch_processing(&self) -> RecordStream<'_>;

    /// Write back records changed in place (refresh, migration).
    async fn persist(&self, _records: &[Arc<dyn FileRecord>]) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Repository backed by a vector, for tests and embedding.
///
/// Returns the stored `Arc`s, so lookups preserve record identity.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    records: RwLock<Vec<Arc<dyn FileRecord>>>,
    flushes: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, record: Arc<dyn FileRecord>) {
        self.records
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record);
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// Number of `persist` calls seen so far.
    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> Vec<Arc<dyn FileRecord>> {
        self.records
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl FileRepository for InMemoryRepository {
    async fn find_by_hash_and_size(
        &self,
        content_hash: &str,
        size_bytes: u64,
    ) -> Result<Option<Arc<dyn FileRecord>>, RepositoryError> {
        Ok(self
            .snapshot()
            .into_iter()
            .find(|record| record.metadata().matches_content(content_hash, size_bytes)))
    }

    fn find_all_for_batch_processing(&self) -> RecordStream<'_> {
        stream::iter(self.snapshot().into_iter().map(Ok)).boxed()
    }

    async fn persist(&self, records: &[Arc<dyn FileRecord>]) -> Result<(), RepositoryError> {
        self.flushes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(count = records.len(), "In-memory repository flush");
        Ok(())
    }
}
