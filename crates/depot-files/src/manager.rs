//! The file manager: upload, deduplicate, stage, commit and serve file content.
//!
//! A record is either pending (its bytes sit in a local staging file and it has an entry in
//! the pending arena) or committed (its bytes are in storage at the pathname derived by the
//! naming strategy). Deduplicated uploads return an existing record and never stage.
//!
//! One manager belongs to one unit of work. Operations that change pending state take
//! `&mut self`; wrap the manager in a lock to share it between tasks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use depot_core::{ConfigurationError, DepotConfig, FileMetadata, FileRecord, MetadataUpdate};
use depot_storage::{ByteStream, Storage, StorageError};
use futures::StreamExt;

use crate::content::{inspect_file, inspect_stream, ContentInfo, ContentSniffer, MimeDetector};
use crate::error::{FileError, FileResult};
use crate::factory::{RecordFactory, StoredFileFactory};
use crate::naming::{DeterministicNaming, NamingSpec, NamingStrategy};
use crate::pending::{PendingKey, PendingUpload, PendingUploads};
use crate::repository::FileRepository;
use crate::source::UploadSource;

/// A record as returned by [`FileManager::upload`].
///
/// Carries the pending key when the upload was staged. Clones share the record.
#[derive(Debug, Clone)]
pub struct FileHandle {
    record: Arc<dyn FileRecord>,
    pending: Option<PendingKey>,
}

impl FileHandle {
    /// Wrap a record that is already in storage, e.g. one loaded from a repository.
    pub fn committed(record: Arc<dyn FileRecord>) -> Self {
        Self {
            record,
            pending: None,
        }
    }

    pub fn record(&self) -> &Arc<dyn FileRecord> {
        &self.record
    }

    pub fn into_record(self) -> Arc<dyn FileRecord> {
        self.record
    }

    pub fn pending_key(&self) -> Option<PendingKey> {
        self.pending
    }

    pub fn metadata(&self) -> FileMetadata {
        self.record.metadata()
    }

    /// Reference equality of the underlying records.
    pub fn same_record(&self, other: &FileHandle) -> bool {
        Arc::ptr_eq(&self.record, &other.record)
    }

    pub fn downcast<T: FileRecord>(&self) -> Option<&T> {
        self.record.as_any().downcast_ref::<T>()
    }
}

/// Size, digest and sniffed MIME type of a record's current bytes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ContentInspection {
    pub size_bytes: u64,
    pub content_hash: String,
    pub mime_type: String,
}

/// Builder for [`FileManager`].
pub struct FileManagerBuilder {
    name: String,
    storage: Arc<dyn Storage>,
    naming: Box<dyn DeterministicNaming>,
    repository: Option<Arc<dyn FileRepository>>,
    factory: Arc<dyn RecordFactory>,
    mime_detector: Arc<dyn MimeDetector>,
    staging_dir: PathBuf,
}

impl FileManagerBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Durable lookup consulted for deduplication after the pending uploads.
    pub fn repository(mut self, repository: Arc<dyn FileRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    pub fn factory(mut self, factory: impl RecordFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn mime_detector(mut self, detector: impl MimeDetector + 'static) -> Self {
        self.mime_detector = Arc::new(detector);
        self
    }

    /// Directory for staging streamed uploads. Defaults to the OS temp directory.
    pub fn staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub fn build(self) -> FileManager {
        FileManager {
            name: self.name,
            storage: self.storage,
            naming: self.naming,
            repository: self.repository,
            factory: self.factory,
            mime_detector: self.mime_detector,
            staging_dir: self.staging_dir,
            pending: PendingUploads::new(),
        }
    }
}

pub struct FileManager {
    name: String,
    storage: Arc<dyn Storage>,
    naming: Box<dyn DeterministicNaming>,
    repository: Option<Arc<dyn FileRepository>>,
    factory: Arc<dyn RecordFactory>,
    mime_detector: Arc<dyn MimeDetector>,
    staging_dir: PathBuf,
    pending: PendingUploads,
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileManager")
            .field("name", &self.name)
            .field("backend", &self.storage.backend_type())
            .field("staging_dir", &self.staging_dir)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}

fn describe(record: &dyn FileRecord) -> String {
    let metadata = record.metadata();
    match record.identifiable().and_then(|i| i.id()) {
        Some(id) => format!("{} #{}", record.type_name(), id),
        None => format!(
            "{} '{}' ({})",
            record.type_name(),
            metadata.original_filename,
            metadata.content_hash
        ),
    }
}

impl FileManager {
    pub fn builder(
        storage: Arc<dyn Storage>,
        naming: impl DeterministicNaming + 'static,
    ) -> FileManagerBuilder {
        FileManagerBuilder {
            name: "default".to_string(),
            storage,
            naming: Box::new(naming),
            repository: None,
            factory: Arc::new(StoredFileFactory),
            mime_detector: Arc::new(ContentSniffer),
            staging_dir: std::env::temp_dir(),
        }
    }

    pub fn new(storage: Arc<dyn Storage>, naming: impl DeterministicNaming + 'static) -> Self {
        Self::builder(storage, naming).build()
    }

    /// Builder with the naming strategy and staging directory taken from configuration.
    pub fn from_config(
        storage: Arc<dyn Storage>,
        config: &DepotConfig,
    ) -> Result<FileManagerBuilder, ConfigurationError> {
        let naming = NamingSpec::from_config(config)?.build()?;
        Ok(Self::builder(storage, naming).staging_dir(config.staging_dir.clone()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn naming(&self) -> &dyn DeterministicNaming {
        self.naming.as_ref()
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Handle for a record, pending if this manager has it staged.
    pub fn handle(&self, record: Arc<dyn FileRecord>) -> FileHandle {
        let pending = self.pending.find_record(&record);
        FileHandle { record, pending }
    }

    fn pending_key(&self, handle: &FileHandle) -> Option<PendingKey> {
        // Keys are only unique within one arena; the slot must hold this very record.
        match handle.pending {
            Some(key)
                if self
                    .pending
                    .get(key)
                    .is_ok_and(|entry| Arc::ptr_eq(&entry.record, &handle.record)) =>
            {
                Some(key)
            }
            _ => self.pending.find_record(&handle.record),
        }
    }

    fn pending_entry(&self, handle: &FileHandle) -> Option<&PendingUpload> {
        self.pending_key(handle)
            .and_then(|key| self.pending.get(key).ok())
    }

    pub fn is_pending(&self, handle: &FileHandle) -> bool {
        self.pending_key(handle).is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Accept new content.
    ///
    /// Streamed input is drained into a staging file first. Identical content (same hash and
    /// size) already pending here, or already durable in the repository, is returned as-is.
    /// Otherwise a new record is created and staged.
    pub async fn upload(&mut self, source: UploadSource) -> FileResult<FileHandle> {
        let start = std::time::Instant::now();
        let original_filename = source.original_filename();
        let staged = source.stage(&self.staging_dir).await?;
        let info = inspect_file(staged.path()).await?;

        if let Some((key, record)) = self
            .pending
            .find_by_hash_and_size(&info.content_hash, info.size_bytes)
        {
            tracing::info!(
                manager = %self.name,
                content_hash = %info.content_hash,
                size_bytes = info.size_bytes,
                "Upload deduplicated against pending record"
            );
            return Ok(FileHandle {
                record,
                pending: Some(key),
            });
        }

        if let Some(ref repository) = self.repository {
            if let Some(record) = repository
                .find_by_hash_and_size(&info.content_hash, info.size_bytes)
                .await?
            {
                tracing::info!(
                    manager = %self.name,
                    content_hash = %info.content_hash,
                    size_bytes = info.size_bytes,
                    record = %describe(record.as_ref()),
                    "Upload deduplicated against stored record"
                );
                return Ok(FileHandle::committed(record));
            }
        }

        let ContentInfo {
            size_bytes,
            content_hash,
            head,
        } = info;
        let mime_type = self.mime_detector.detect(&head)?;
        let record = self.factory.create(
            original_filename,
            size_bytes,
            content_hash.clone(),
            mime_type.clone(),
        );
        let owned = staged.is_owned();
        let key = self.pending.put(Arc::clone(&record), staged);

        tracing::info!(
            manager = %self.name,
            content_hash = %content_hash,
            size_bytes = size_bytes,
            mime_type = %mime_type,
            staged_copy = owned,
            pending = self.pending.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File staged"
        );

        Ok(FileHandle {
            record,
            pending: Some(key),
        })
    }

    /// Resolve the final pathname of a pending record and persist it on a path-aware record.
    fn prepare_key(&self, key: PendingKey) -> FileResult<String> {
        let entry = self.pending.get(key)?;
        let pathname = self.naming.pathname(entry.record.as_ref())?;
        if let Some(path_aware) = entry.record.path_aware() {
            path_aware.set_pathname(pathname.clone())?;
        }
        Ok(pathname)
    }

    fn require_pending(&self, handle: &FileHandle) -> FileResult<PendingKey> {
        self.pending_key(handle)
            .ok_or_else(|| FileError::NotPending(describe(handle.record.as_ref())))
    }

    /// First phase of a commit: fix the pathname without writing anything.
    ///
    /// Needed when the pathname must be stored alongside the record inside the owning
    /// transaction. `commit` resolves the same pathname again.
    pub fn prepare(&self, handle: &FileHandle) -> FileResult<String> {
        let key = self.require_pending(handle)?;
        self.prepare_key(key)
    }

    /// `prepare` for every pending record, oldest first.
    pub fn prepare_pending(&self) -> FileResult<Vec<(Arc<dyn FileRecord>, String)>> {
        self.pending
            .keys()
            .into_iter()
            .map(|key| {
                let pathname = self.prepare_key(key)?;
                let record = Arc::clone(&self.pending.get(key)?.record);
                Ok((record, pathname))
            })
            .collect()
    }

    async fn commit_key(&mut self, key: PendingKey) -> FileResult<String> {
        let start = std::time::Instant::now();
        let pathname = self.prepare_key(key)?;

        let file = self.pending.get(key)?.staged.open().await?;
        let written = self.storage.write(&pathname, Box::pin(file)).await?;

        if let Some(entry) = self.pending.remove(key) {
            tracing::info!(
                manager = %self.name,
                pathname = %pathname,
                record = %describe(entry.record.as_ref()),
                size_bytes = written,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "File committed"
            );
        }

        Ok(pathname)
    }

    /// Move a pending record's bytes into storage.
    ///
    /// Fails with `NotPending` for records that were never staged here, were already
    /// committed, or were discarded by `clear`. The pending entry is removed only once the
    /// write succeeded.
    pub async fn commit(&mut self, handle: &FileHandle) -> FileResult<String> {
        let key = self.require_pending(handle)?;
        self.commit_key(key).await
    }

    /// Commit every pending record, oldest first. Stops at the first failure.
    pub async fn commit_pending(&mut self) -> FileResult<Vec<String>> {
        let keys = self.pending.keys();
        let mut pathnames = Vec::with_capacity(keys.len());
        for key in keys {
            pathnames.push(self.commit_key(key).await?);
        }
        Ok(pathnames)
    }

    /// Delete a record's bytes.
    ///
    /// A pending record loses its staging file (if the manager owns it) and its pending
    /// entry; storage is not touched.
    pub async fn remove(&mut self, handle: &FileHandle) -> FileResult<()> {
        if let Some(key) = self.pending_key(handle) {
            if let Some(entry) = self.pending.remove(key) {
                tracing::info!(
                    manager = %self.name,
                    record = %describe(entry.record.as_ref()),
                    staged_copy = entry.staged.is_owned(),
                    "Pending upload discarded"
                );
            }
            return Ok(());
        }

        let pathname = self.naming.pathname(handle.record.as_ref())?;
        self.storage.remove(&pathname).await?;
        tracing::info!(
            manager = %self.name,
            pathname = %pathname,
            "File removed"
        );
        Ok(())
    }

    /// Committed pathname of a record.
    pub fn pathname(&self, handle: &FileHandle) -> FileResult<String> {
        if self.is_pending(handle) {
            return Err(FileError::StillPending(describe(handle.record.as_ref())));
        }
        Ok(self.naming.pathname(handle.record.as_ref())?)
    }

    /// Whole content; staged bytes for a pending record.
    pub async fn read(&self, handle: &FileHandle) -> FileResult<Vec<u8>> {
        if let Some(entry) = self.pending_entry(handle) {
            return Ok(tokio::fs::read(entry.staged.path()).await?);
        }
        let pathname = self.naming.pathname(handle.record.as_ref())?;
        Ok(self.storage.read(&pathname).await?)
    }

    /// Content as a stream; staged bytes for a pending record.
    pub async fn read_stream(&self, handle: &FileHandle) -> FileResult<ByteStream> {
        if let Some(entry) = self.pending_entry(handle) {
            let file = entry.staged.open().await?;
            let stream = tokio_util::io::ReaderStream::new(file).map(|chunk| chunk.map_err(StorageError::from));
            return Ok(Box::pin(stream));
        }
        let pathname = self.naming.pathname(handle.record.as_ref())?;
        Ok(self.storage.read_stream(&pathname).await?)
    }

    /// Recompute size, hash and MIME type from the record's current bytes.
    pub async fn inspect(&self, handle: &FileHandle) -> FileResult<ContentInspection> {
        let info = match self.pending_entry(handle) {
            Some(entry) => inspect_file(entry.staged.path()).await?,
            None => inspect_stream(self.read_stream(handle).await?).await?,
        };
        Ok(ContentInspection {
            mime_type: self.mime_detector.detect(&info.head)?,
            size_bytes: info.size_bytes,
            content_hash: info.content_hash,
        })
    }

    /// Overwrite the record's metadata with what its current bytes say.
    ///
    /// Requires a mutable record. Returns whether anything changed. A changed hash or size
    /// moves the record off its deduplication key; this is logged, not refused.
    pub async fn refresh(&self, handle: &FileHandle) -> FileResult<bool> {
        let record = handle.record.as_ref();
        if record.mutable().is_none() {
            return Err(FileError::Unsupported {
                operation: "refresh",
                capability: "mutable",
                record_type: record.type_name().to_string(),
            });
        }

        let current = self.inspect(handle).await?;
        let before = record.metadata();
        let content_changed = !before.matches_content(&current.content_hash, current.size_bytes);
        if !content_changed && before.mime_type == current.mime_type {
            return Ok(false);
        }

        if content_changed {
            tracing::warn!(
                manager = %self.name,
                record = %describe(record),
                old_hash = %before.content_hash,
                new_hash = %current.content_hash,
                old_size = before.size_bytes,
                new_size = current.size_bytes,
                "Refresh changed the deduplication key"
            );
        }

        if let Some(mutable) = record.mutable() {
            mutable.apply(MetadataUpdate {
                original_filename: None,
                size_bytes: Some(current.size_bytes),
                content_hash: Some(current.content_hash),
                mime_type: Some(current.mime_type),
                modified_at: Some(Utc::now()),
            });
        }

        tracing::info!(manager = %self.name, record = %describe(record), "File refreshed");
        Ok(true)
    }

    /// Move a committed record's bytes from where `old` puts them to where this manager's
    /// naming puts them.
    ///
    /// Returns false when there is nothing to move: the record is pending, both strategies
    /// agree, or no blob exists at the old pathname (e.g. already migrated).
    pub async fn migrate(
        &self,
        handle: &FileHandle,
        old: &dyn DeterministicNaming,
    ) -> FileResult<bool> {
        if self.is_pending(handle) {
            return Ok(false);
        }
        let record = handle.record.as_ref();
        let from = old.pathname(record)?;
        let to = self.naming.pathname(record)?;
        if from == to {
            return Ok(false);
        }
        if !self.storage.exists(&from).await? {
            tracing::debug!(manager = %self.name, from = %from, "Nothing to migrate");
            return Ok(false);
        }

        self.storage.copy(&from, &to).await?;
        self.storage.remove(&from).await?;

        if let Some(path_aware) = record.path_aware() {
            path_aware.relocate(to.clone());
        }

        tracing::info!(
            manager = %self.name,
            record = %describe(record),
            from = %from,
            to = %to,
            "File migrated"
        );
        Ok(true)
    }

    /// Discard every pending upload without writing anything. Returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let discarded = self.pending.clear();
        if discarded > 0 {
            tracing::info!(
                manager = %self.name,
                discarded = discarded,
                "Pending uploads cleared"
            );
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{md5_hex, FixedMime};
    use crate::naming::{HashNaming, HashSplitNaming, IdNaming, PersistedPath, RandomUuidNaming};
    use crate::repository::InMemoryRepository;
    use depot_core::{PathAware, StoredFile};
    use depot_storage::MemoryStorage;
    use futures::TryStreamExt;

    fn manager(storage: &MemoryStorage) -> FileManager {
        FileManager::builder(Arc::new(storage.clone()), HashNaming)
            .staging_dir(std::env::temp_dir().join("depot-manager-tests"))
            .build()
    }

    #[tokio::test]
    async fn upload_stages_without_touching_storage() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);

        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"test".to_vec()))
            .await
            .unwrap();

        let meta = handle.metadata();
        assert_eq!(meta.original_filename, "a.txt");
        assert_eq!(meta.size_bytes, 4);
        assert_eq!(meta.content_hash, "098f6bcd4621d373cade4e832627b4f6");
        assert_eq!(meta.mime_type, "text/plain");
        assert!(manager.is_pending(&handle));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn identical_pending_uploads_share_one_record() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);

        let first = manager
            .upload(UploadSource::bytes("a.txt", b"same".to_vec()))
            .await
            .unwrap();
        let second = manager
            .upload(UploadSource::bytes("b.txt", b"same".to_vec()))
            .await
            .unwrap();

        assert!(first.same_record(&second));
        assert_eq!(manager.pending_len(), 1);
        assert_eq!(second.metadata().original_filename, "a.txt");
    }

    #[tokio::test]
    async fn repository_hit_skips_staging() {
        let storage = MemoryStorage::new();
        let repo = Arc::new(InMemoryRepository::new());
        let existing: Arc<dyn FileRecord> = Arc::new(StoredFile::with_id(
            5,
            FileMetadata::new("old.txt", 4, md5_hex(b"test"), "text/plain"),
        ));
        repo.add(Arc::clone(&existing));

        let mut manager = FileManager::builder(Arc::new(storage.clone()), HashNaming)
            .repository(repo)
            .build();
        let handle = manager
            .upload(UploadSource::bytes("new.txt", b"test".to_vec()))
            .await
            .unwrap();

        assert!(Arc::ptr_eq(handle.record(), &existing));
        assert!(!manager.is_pending(&handle));
        assert_eq!(manager.pending_len(), 0);
        assert!(matches!(
            manager.commit(&handle).await,
            Err(FileError::NotPending(_))
        ));
    }

    #[tokio::test]
    async fn commit_writes_once_and_persists_pathname() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"test".to_vec()))
            .await
            .unwrap();

        let pathname = manager.commit(&handle).await.unwrap();
        assert_eq!(pathname, "098f6bcd4621d373cade4e832627b4f6");
        assert_eq!(storage.get(&pathname).unwrap().as_ref(), b"test");
        assert!(!manager.is_pending(&handle));

        let stored = handle.downcast::<StoredFile>().unwrap();
        assert_eq!(stored.pathname().as_deref(), Some(pathname.as_str()));

        assert!(matches!(
            manager.commit(&handle).await,
            Err(FileError::NotPending(_))
        ));
    }

    #[tokio::test]
    async fn commit_needs_identity_for_id_naming() {
        let storage = MemoryStorage::new();
        let mut manager = FileManager::new(Arc::new(storage.clone()), IdNaming);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"abc".to_vec()))
            .await
            .unwrap();

        assert!(matches!(
            manager.commit(&handle).await,
            Err(FileError::Naming(_))
        ));
        assert!(manager.is_pending(&handle));

        handle.downcast::<StoredFile>().unwrap().assign_id(1).unwrap();
        assert_eq!(manager.commit(&handle).await.unwrap(), "1");
        assert!(storage.get("1").is_some());
    }

    #[tokio::test]
    async fn pending_reads_come_from_staging() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.bin", vec![7u8; 100_000]))
            .await
            .unwrap();

        assert_eq!(manager.read(&handle).await.unwrap(), vec![7u8; 100_000]);
        let streamed: Vec<bytes::Bytes> = manager
            .read_stream(&handle)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(streamed.concat(), vec![7u8; 100_000]);
        assert!(storage.is_empty());
        assert!(matches!(
            manager.pathname(&handle),
            Err(FileError::StillPending(_))
        ));
    }

    #[tokio::test]
    async fn removing_pending_upload_never_touches_storage() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"drop me".to_vec()))
            .await
            .unwrap();
        let staged = manager
            .pending
            .get(handle.pending_key().unwrap())
            .unwrap()
            .staged
            .path()
            .to_path_buf();

        manager.remove(&handle).await.unwrap();
        assert!(!staged.exists());
        assert_eq!(manager.pending_len(), 0);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn removing_committed_record_deletes_blob() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"bye".to_vec()))
            .await
            .unwrap();
        let pathname = manager.commit(&handle).await.unwrap();

        manager.remove(&handle).await.unwrap();
        assert!(storage.get(&pathname).is_none());
    }

    #[tokio::test]
    async fn clear_discards_pending_and_staging_files() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"rolled back".to_vec()))
            .await
            .unwrap();
        let staged = manager
            .pending
            .get(handle.pending_key().unwrap())
            .unwrap()
            .staged
            .path()
            .to_path_buf();

        assert_eq!(manager.clear(), 1);
        assert!(!staged.exists());
        assert!(matches!(
            manager.commit(&handle).await,
            Err(FileError::NotPending(_))
        ));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn commit_pending_follows_upload_order() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        for body in ["one", "two", "three"] {
            manager
                .upload(UploadSource::bytes("f.txt", body.as_bytes().to_vec()))
                .await
                .unwrap();
        }

        let pathnames = manager.commit_pending().await.unwrap();
        assert_eq!(
            pathnames,
            vec![md5_hex(b"one"), md5_hex(b"two"), md5_hex(b"three")]
        );
        assert_eq!(manager.pending_len(), 0);
        assert_eq!(storage.len(), 3);
    }

    #[tokio::test]
    async fn mime_detection_failure_aborts_upload() {
        let storage = MemoryStorage::new();
        let mut manager = FileManager::builder(Arc::new(storage), HashNaming)
            .mime_detector(FixedMime(None))
            .build();
        assert!(matches!(
            manager
                .upload(UploadSource::bytes("a.txt", b"x".to_vec()))
                .await,
            Err(FileError::MimeDetection(_))
        ));
        assert_eq!(manager.pending_len(), 0);
    }

    #[tokio::test]
    async fn refresh_picks_up_replaced_bytes() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"before".to_vec()))
            .await
            .unwrap();
        let pathname = manager.commit(&handle).await.unwrap();

        assert!(!manager.refresh(&handle).await.unwrap());

        storage.insert(&pathname, &b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"[..]);
        assert!(manager.refresh(&handle).await.unwrap());

        let meta = handle.metadata();
        assert_eq!(meta.mime_type, "image/png");
        assert_eq!(meta.size_bytes, 16);
        assert!(meta.modified_at.is_some());
    }

    #[tokio::test]
    async fn migrate_moves_blob_once() {
        let storage = MemoryStorage::new();
        let mut old_manager = manager(&storage);
        let handle = old_manager
            .upload(UploadSource::bytes("a.txt", b"test".to_vec()))
            .await
            .unwrap();
        old_manager.commit(&handle).await.unwrap();

        let new_manager = FileManager::new(
            Arc::new(storage.clone()),
            HashSplitNaming::new(16).unwrap(),
        );
        let handle = FileHandle::committed(handle.into_record());

        assert!(new_manager.migrate(&handle, &HashNaming).await.unwrap());
        assert!(!new_manager.migrate(&handle, &HashNaming).await.unwrap());

        let target = "098f6bcd4621d373/cade4e832627b4f6/098f6bcd4621d373cade4e832627b4f6";
        assert_eq!(storage.keys(), vec![target.to_string()]);
        assert_eq!(new_manager.read(&handle).await.unwrap(), b"test");
        let stored = handle.downcast::<StoredFile>().unwrap();
        assert_eq!(stored.pathname().as_deref(), Some(target));
    }

    #[tokio::test]
    async fn persisted_random_names_survive_re_resolution() {
        let storage = MemoryStorage::new();
        let mut manager = FileManager::new(
            Arc::new(storage.clone()),
            PersistedPath::with_fallback(RandomUuidNaming),
        );
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"random".to_vec()))
            .await
            .unwrap();

        let pathname = manager.commit(&handle).await.unwrap();
        assert_eq!(manager.pathname(&handle).unwrap(), pathname);
        assert_eq!(manager.pathname(&handle).unwrap(), pathname);
        assert_eq!(manager.read(&handle).await.unwrap(), b"random");
    }

    #[tokio::test]
    async fn handle_recovers_pending_key_by_identity() {
        let storage = MemoryStorage::new();
        let mut manager = manager(&storage);
        let handle = manager
            .upload(UploadSource::bytes("a.txt", b"abc".to_vec()))
            .await
            .unwrap();

        let rebuilt = manager.handle(Arc::clone(handle.record()));
        assert_eq!(rebuilt.pending_key(), handle.pending_key());
        assert!(manager.is_pending(&FileHandle::committed(Arc::clone(handle.record()))));
    }

    #[tokio::test]
    async fn handles_from_another_manager_are_not_pending_here() {
        let storage = MemoryStorage::new();
        let mut a = manager(&storage);
        let mut b = manager(&storage);
        let foreign = a
            .upload(UploadSource::bytes("a.txt", b"AAAA".to_vec()))
            .await
            .unwrap();
        let own = b
            .upload(UploadSource::bytes("b.txt", b"BBBB".to_vec()))
            .await
            .unwrap();
        assert_eq!(foreign.pending_key(), own.pending_key());

        assert!(!b.is_pending(&foreign));
        assert!(matches!(b.commit(&foreign).await, Err(FileError::NotPending(_))));
        assert!(b.read(&foreign).await.is_err());
        b.remove(&foreign).await.unwrap();

        assert_eq!(b.pending_len(), 1);
        assert!(storage.is_empty());
        assert_eq!(b.read(&own).await.unwrap(), b"BBBB");
        assert_eq!(a.read(&foreign).await.unwrap(), b"AAAA");
    }
}
