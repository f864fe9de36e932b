//! Construction of new file records.

use std::sync::Arc;

use depot_core::{FileMetadata, FileRecord, StoredFile};

/// Builds the record for newly uploaded content. Implement it to upload into a custom
/// record type.
pub trait RecordFactory: Send + Sync {
    fn create(
        &self,
        original_filename: String,
        size_bytes: u64,
        content_hash: String,
        mime_type: String,
    ) -> Arc<dyn FileRecord>;
}

/// Produces [`StoredFile`] records.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredFileFactory;

impl RecordFactory for StoredFileFactory {
    fn create(
        &self,
        original_filename: String,
        size_bytes: u64,
        content_hash: String,
        mime_type: String,
    ) -> Arc<dyn FileRecord> {
        Arc::new(StoredFile::new(FileMetadata::new(
            original_filename,
            size_bytes,
            content_hash,
            mime_type,
        )))
    }
}
