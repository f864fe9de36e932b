use std::any::Any;
use std::sync::{Arc, OnceLock, RwLock};

use crate::error::RecordError;
use crate::models::record::{
    FileMetadata, FileRecord, Identifiable, MetadataUpdate, MutableRecord, PathAware, Previewable,
};

/// Default record type, carrying every capability.
///
/// The identity is assigned by the persistence layer when the owning row is inserted, so it is
/// absent while the upload is pending.
#[derive(Debug)]
pub struct StoredFile {
    id: OnceLock<i64>,
    metadata: RwLock<FileMetadata>,
    pathname: RwLock<Option<String>>,
    preview: RwLock<Option<Arc<dyn FileRecord>>>,
}

impl StoredFile {
    pub fn new(metadata: FileMetadata) -> Self {
        Self {
            id: OnceLock::new(),
            metadata: RwLock::new(metadata),
            pathname: RwLock::new(None),
            preview: RwLock::new(None),
        }
    }

    pub fn with_id(id: i64, metadata: FileMetadata) -> Self {
        let file = Self::new(metadata);
        let _ = file.id.set(id);
        file
    }

    /// Rebuild a record loaded from durable storage.
    pub fn restore(id: i64, metadata: FileMetadata, pathname: Option<String>) -> Self {
        let file = Self::with_id(id, metadata);
        *file.pathname.write().unwrap_or_else(|p| p.into_inner()) = pathname;
        file
    }

    pub fn id(&self) -> Option<i64> {
        self.id.get().copied()
    }

    /// Set-once. Re-assigning the same id is accepted.
    pub fn assign_id(&self, id: i64) -> Result<(), RecordError> {
        match self.id.set(id) {
            Ok(()) => Ok(()),
            Err(_) => match self.id.get() {
                Some(existing) if *existing == id => Ok(()),
                Some(existing) => Err(RecordError::IdentityAlreadyAssigned {
                    existing: existing.to_string(),
                }),
                None => Ok(()),
            },
        }
    }
}

impl FileRecord for StoredFile {
    fn metadata(&self) -> FileMetadata {
        self.metadata
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        "StoredFile"
    }

    fn identifiable(&self) -> Option<&dyn Identifiable> {
        Some(self)
    }

    fn path_aware(&self) -> Option<&dyn PathAware> {
        Some(self)
    }

    fn mutable(&self) -> Option<&dyn MutableRecord> {
        Some(self)
    }

    fn previewable(&self) -> Option<&dyn Previewable> {
        Some(self)
    }
}

impl Identifiable for StoredFile {
    fn id(&self) -> Option<String> {
        self.id.get().map(|id| id.to_string())
    }
}

impl PathAware for StoredFile {
    fn pathname(&self) -> Option<String> {
        self.pathname
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_pathname(&self, pathname: String) -> Result<(), RecordError> {
        let mut current = self
            .pathname
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match current.as_ref() {
            Some(existing) if *existing == pathname => Ok(()),
            Some(existing) => Err(RecordError::PathnameAlreadySet {
                existing: existing.clone(),
                attempted: pathname,
            }),
            None => {
                *current = Some(pathname);
                Ok(())
            }
        }
    }

    fn relocate(&self, pathname: String) {
        *self
            .pathname
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(pathname);
    }
}

impl MutableRecord for StoredFile {
    fn apply(&self, update: MetadataUpdate) {
        let mut metadata = self
            .metadata
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        update.apply_to(&mut metadata);
    }
}

impl Previewable for StoredFile {
    fn preview(&self) -> Option<Arc<dyn FileRecord>> {
        self.preview
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_preview(&self, preview: Option<Arc<dyn FileRecord>>) {
        *self
            .preview
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = preview;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredFile {
        StoredFile::new(FileMetadata::new(
            "report.pdf",
            1024,
            "9aa1c5fc7c9388166d7ce7fd46648dd1",
            "application/pdf",
        ))
    }

    #[test]
    fn identity_is_absent_until_assigned() {
        let file = sample();
        assert_eq!(file.id(), None);
        assert_eq!(Identifiable::id(&file), None);

        file.assign_id(7).unwrap();
        assert_eq!(file.id(), Some(7));
        assert_eq!(Identifiable::id(&file), Some("7".to_string()));
    }

    #[test]
    fn identity_is_set_once() {
        let file = StoredFile::with_id(1, sample().metadata());
        assert!(file.assign_id(1).is_ok());
        assert_eq!(
            file.assign_id(2),
            Err(RecordError::IdentityAlreadyAssigned {
                existing: "1".to_string()
            })
        );
    }

    #[test]
    fn pathname_is_set_once() {
        let file = sample();
        assert_eq!(file.pathname(), None);

        file.set_pathname("a/b.pdf".to_string()).unwrap();
        file.set_pathname("a/b.pdf".to_string()).unwrap();
        let err = file.set_pathname("c/d.pdf".to_string()).unwrap_err();

        assert!(matches!(err, RecordError::PathnameAlreadySet { .. }));
        assert_eq!(file.pathname().as_deref(), Some("a/b.pdf"));

        file.relocate("c/d.pdf".to_string());
        assert_eq!(file.pathname().as_deref(), Some("c/d.pdf"));
    }

    #[test]
    fn apply_updates_metadata_in_place() {
        let file = sample();
        file.apply(MetadataUpdate {
            mime_type: Some("application/octet-stream".to_string()),
            ..Default::default()
        });
        assert_eq!(file.metadata().mime_type, "application/octet-stream");
        assert_eq!(file.metadata().original_filename, "report.pdf");
    }

    #[test]
    fn preview_can_be_set_and_cleared() {
        let file = sample();
        let thumb: Arc<dyn FileRecord> = Arc::new(StoredFile::new(FileMetadata::new(
            "report.png",
            10,
            "abc",
            "image/png",
        )));

        file.set_preview(Some(thumb.clone()));
        let preview = file.preview().unwrap();
        assert!(Arc::ptr_eq(&preview, &thumb));

        file.set_preview(None);
        assert!(file.preview().is_none());
    }

    #[test]
    fn capabilities_are_exposed_through_dyn_record() {
        let record: Arc<dyn FileRecord> = Arc::new(sample());
        assert!(record.identifiable().is_some());
        assert!(record.path_aware().is_some());
        assert!(record.mutable().is_some());
        assert!(record.previewable().is_some());
        assert!(record.as_any().downcast_ref::<StoredFile>().is_some());
        assert_eq!(record.type_name(), "StoredFile");
    }

    #[test]
    fn restore_keeps_persisted_pathname() {
        let file = StoredFile::restore(3, sample().metadata(), Some("x/y".to_string()));
        assert_eq!(file.id(), Some(3));
        assert_eq!(file.pathname().as_deref(), Some("x/y"));
    }
}
