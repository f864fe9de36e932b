use std::any::{Any, TypeId};
use std::sync::Arc;

use depot_core::FileRecord;
use depot_storage::ByteStream;

use crate::error::{FileError, FileResult};
use crate::manager::{ContentInspection, FileHandle, FileManager};
use crate::naming::DeterministicNaming;
use crate::source::UploadSource;

struct Route {
    type_id: TypeId,
    type_name: &'static str,
    manager: FileManager,
}

/// Routes file operations to one manager per record type.
///
/// The manager given to [`DelegatingManager::new`] is the default: it receives plain uploads
/// and is the first route tried. Further routes are tried in registration order and the first
/// one whose type matches the record's concrete type wins.
pub struct DelegatingManager {
    routes: Vec<Route>,
}

impl DelegatingManager {
    pub fn new<T: FileRecord>(default: FileManager) -> Self {
        Self {
            routes: vec![Route {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                manager: default,
            }],
        }
    }

    pub fn register<T: FileRecord>(mut self, manager: FileManager) -> Self {
        self.routes.push(Route {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            manager,
        });
        self
    }

    pub fn default_manager(&self) -> &FileManager {
        &self.routes[0].manager
    }

    fn position(&self, type_id: TypeId, type_name: &str) -> FileResult<usize> {
        self.routes
            .iter()
            .position(|route| route.type_id == type_id)
            .ok_or_else(|| FileError::NoManager(type_name.to_string()))
    }

    fn index_for(&self, record: &dyn FileRecord) -> FileResult<usize> {
        self.position(Any::type_id(record.as_any()), record.type_name())
    }

    /// Manager responsible for a record's concrete type.
    pub fn manager_for(&self, record: &dyn FileRecord) -> FileResult<&FileManager> {
        let index = self.index_for(record)?;
        Ok(&self.routes[index].manager)
    }

    fn manager_for_mut(&mut self, record: &dyn FileRecord) -> FileResult<&mut FileManager> {
        let index = self.index_for(record)?;
        Ok(&mut self.routes[index].manager)
    }

    /// Upload through the default manager.
    pub async fn upload(&mut self, source: UploadSource) -> FileResult<FileHandle> {
        self.upload_via(0, source).await
    }

    /// Upload through the manager registered for `T`.
    pub async fn upload_for<T: FileRecord>(&mut self, source: UploadSource) -> FileResult<FileHandle> {
        let index = self.position(TypeId::of::<T>(), std::any::type_name::<T>())?;
        self.upload_via(index, source).await
    }

    /// The returned record must route back to the manager that staged it, or later calls
    /// would be dispatched elsewhere; a mismatched upload is discarded.
    async fn upload_via(&mut self, index: usize, source: UploadSource) -> FileResult<FileHandle> {
        let handle = self.routes[index].manager.upload(source).await?;
        if self.index_for(handle.record().as_ref()).ok() == Some(index) {
            return Ok(handle);
        }

        let route = &mut self.routes[index];
        if route.manager.is_pending(&handle) {
            route.manager.remove(&handle).await?;
        }
        tracing::warn!(
            manager = %route.manager.name(),
            route = route.type_name,
            record_type = handle.record().type_name(),
            "Upload produced a record this manager does not route"
        );
        Err(FileError::NoManager(handle.record().type_name().to_string()))
    }

    pub async fn commit(&mut self, handle: &FileHandle) -> FileResult<String> {
        self.manager_for_mut(handle.record().as_ref())?
            .commit(handle)
            .await
    }

    pub async fn remove(&mut self, handle: &FileHandle) -> FileResult<()> {
        self.manager_for_mut(handle.record().as_ref())?
            .remove(handle)
            .await
    }

    pub fn pathname(&self, handle: &FileHandle) -> FileResult<String> {
        self.manager_for(handle.record().as_ref())?.pathname(handle)
    }

    pub fn is_pending(&self, handle: &FileHandle) -> FileResult<bool> {
        Ok(self.manager_for(handle.record().as_ref())?.is_pending(handle))
    }

    pub async fn read(&self, handle: &FileHandle) -> FileResult<Vec<u8>> {
        self.manager_for(handle.record().as_ref())?.read(handle).await
    }

    pub async fn read_stream(&self, handle: &FileHandle) -> FileResult<ByteStream> {
        self.manager_for(handle.record().as_ref())?
            .read_stream(handle)
            .await
    }

    pub async fn inspect(&self, handle: &FileHandle) -> FileResult<ContentInspection> {
        self.manager_for(handle.record().as_ref())?
            .inspect(handle)
            .await
    }

    pub async fn refresh(&self, handle: &FileHandle) -> FileResult<bool> {
        self.manager_for(handle.record().as_ref())?
            .refresh(handle)
            .await
    }

    pub async fn migrate(
        &self,
        handle: &FileHandle,
        old: &dyn DeterministicNaming,
    ) -> FileResult<bool> {
        self.manager_for(handle.record().as_ref())?
            .migrate(handle, old)
            .await
    }

    /// Commit everything pending in every manager, default first.
    pub async fn commit_pending(&mut self) -> FileResult<Vec<String>> {
        let mut pathnames = Vec::new();
        for route in &mut self.routes {
            pathnames.extend(route.manager.commit_pending().await?);
        }
        Ok(pathnames)
    }

    /// Records pending across all managers, with the pathnames they will be committed under.
    pub fn prepare_pending(&self) -> FileResult<Vec<(Arc<dyn FileRecord>, String)>> {
        let mut prepared = Vec::new();
        for route in &self.routes {
            prepared.extend(route.manager.prepare_pending()?);
        }
        Ok(prepared)
    }

    pub fn pending_len(&self) -> usize {
        self.routes
            .iter()
            .map(|route| route.manager.pending_len())
            .sum()
    }

    /// Discard pending uploads in every manager, the default included.
    pub fn clear(&mut self) -> usize {
        self.routes
            .iter_mut()
            .map(|route| route.manager.clear())
            .sum()
    }
}

impl std::fmt::Debug for DelegatingManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatingManager")
            .field(
                "routes",
                &self
                    .routes
                    .iter()
                    .map(|r| (r.type_name, r.manager.name()))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::RecordFactory;
    use crate::naming::{HashNaming, Prefix};
    use depot_core::{FileMetadata, StoredFile};
    use depot_storage::MemoryStorage;

    #[derive(Debug)]
    struct Avatar(FileMetadata);

    impl FileRecord for Avatar {
        fn metadata(&self) -> FileMetadata {
            self.0.clone()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct AvatarFactory;

    impl RecordFactory for AvatarFactory {
        fn create(
            &self,
            original_filename: String,
            size_bytes: u64,
            content_hash: String,
            mime_type: String,
        ) -> Arc<dyn FileRecord> {
            Arc::new(Avatar(FileMetadata::new(
                original_filename,
                size_bytes,
                content_hash,
                mime_type,
            )))
        }
    }

    #[derive(Debug)]
    struct Orphan(FileMetadata);

    impl FileRecord for Orphan {
        fn metadata(&self) -> FileMetadata {
            self.0.clone()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn delegating(storage: &MemoryStorage) -> DelegatingManager {
        let files = FileManager::builder(Arc::new(storage.clone()), HashNaming)
            .name("files")
            .build();
        let avatars = FileManager::builder(
            Arc::new(storage.clone()),
            Prefix::new("avatars", HashNaming).unwrap(),
        )
        .name("avatars")
        .factory(AvatarFactory)
        .build();
        DelegatingManager::new::<StoredFile>(files).register::<Avatar>(avatars)
    }

    #[tokio::test]
    async fn routes_operations_by_record_type() {
        let storage = MemoryStorage::new();
        let mut manager = delegating(&storage);

        let file = manager
            .upload(UploadSource::bytes("a.txt", b"file".to_vec()))
            .await
            .unwrap();
        let avatar = manager
            .upload_for::<Avatar>(UploadSource::bytes("me.txt", b"avatar".to_vec()))
            .await
            .unwrap();
        assert!(avatar.downcast::<Avatar>().is_some());
        assert_eq!(manager.pending_len(), 2);

        let file_path = manager.commit(&file).await.unwrap();
        let avatar_path = manager.commit(&avatar).await.unwrap();
        assert!(!file_path.starts_with("avatars/"));
        assert!(avatar_path.starts_with("avatars/"));
        assert_eq!(manager.read(&avatar).await.unwrap(), b"avatar");
    }

    #[tokio::test]
    async fn unknown_record_type_has_no_manager() {
        let storage = MemoryStorage::new();
        let manager = delegating(&storage);
        let orphan = FileHandle::committed(Arc::new(Orphan(FileMetadata::new(
            "x",
            1,
            "0cc175b9c0f1b6a831c399e269772661",
            "text/plain",
        ))));

        assert!(matches!(
            manager.pathname(&orphan),
            Err(FileError::NoManager(_))
        ));
        assert!(matches!(
            manager.read(&orphan).await,
            Err(FileError::NoManager(_))
        ));
    }

    #[tokio::test]
    async fn upload_rejects_records_routed_elsewhere() {
        let storage = MemoryStorage::new();
        let files = FileManager::builder(Arc::new(storage.clone()), HashNaming)
            .name("files")
            .factory(AvatarFactory)
            .build();
        let mut manager = DelegatingManager::new::<StoredFile>(files);

        let result = manager
            .upload(UploadSource::bytes("a.txt", b"mismatch".to_vec()))
            .await;

        assert!(matches!(result, Err(FileError::NoManager(_))));
        assert_eq!(manager.pending_len(), 0);
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn clear_reaches_every_manager() {
        let storage = MemoryStorage::new();
        let mut manager = delegating(&storage);
        manager
            .upload(UploadSource::bytes("a.txt", b"one".to_vec()))
            .await
            .unwrap();
        manager
            .upload_for::<Avatar>(UploadSource::bytes("b.txt", b"two".to_vec()))
            .await
            .unwrap();

        assert_eq!(manager.clear(), 2);
        assert_eq!(manager.pending_len(), 0);
        assert!(storage.is_empty());
    }
}
