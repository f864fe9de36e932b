//! File record model and its optional capabilities.
//!
//! A record is owned by the caller's persistence layer. The file manager only needs a
//! metadata snapshot plus whichever capabilities the concrete type opts into; capabilities
//! are exposed through accessor methods returning `Option<&dyn _>` rather than a class
//! hierarchy.

use std::any::Any;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Immutable-once-set file metadata.
///
/// `content_hash` + `size_bytes` form the deduplication key, not the identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub original_filename: String,
    pub size_bytes: u64,
    /// Lowercase hex digest of the content.
    pub content_hash: String,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileMetadata {
    pub fn new(
        original_filename: impl Into<String>,
        size_bytes: u64,
        content_hash: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            original_filename: original_filename.into(),
            size_bytes,
            content_hash: content_hash.into(),
            mime_type: mime_type.into(),
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    /// Extension of the original filename, without the leading dot.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
    }

    /// Whether this metadata describes the given content.
    pub fn matches_content(&self, content_hash: &str, size_bytes: u64) -> bool {
        self.size_bytes == size_bytes && self.content_hash == content_hash
    }
}

/// Field-wise correction applied through [`MutableRecord`]. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub original_filename: Option<String>,
    pub size_bytes: Option<u64>,
    pub content_hash: Option<String>,
    pub mime_type: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl MetadataUpdate {
    pub fn apply_to(&self, metadata: &mut FileMetadata) {
        if let Some(ref name) = self.original_filename {
            metadata.original_filename = name.clone();
        }
        if let Some(size) = self.size_bytes {
            metadata.size_bytes = size;
        }
        if let Some(ref hash) = self.content_hash {
            metadata.content_hash = hash.clone();
        }
        if let Some(ref mime) = self.mime_type {
            metadata.mime_type = mime.clone();
        }
        if let Some(at) = self.modified_at {
            metadata.modified_at = Some(at);
        }
    }
}

/// A stored file as seen by the file manager.
///
/// Records are shared as `Arc<dyn FileRecord>`; two uploads of identical content return the
/// same allocation. Mutation goes through capabilities, so implementors use interior
/// mutability.
pub trait FileRecord: Any + Send + Sync + Debug {
    /// Snapshot of the current metadata.
    fn metadata(&self) -> FileMetadata;

    fn as_any(&self) -> &dyn Any;

    /// Short type label used in logs and routing errors.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn identifiable(&self) -> Option<&dyn Identifiable> {
        None
    }

    fn path_aware(&self) -> Option<&dyn PathAware> {
        None
    }

    fn mutable(&self) -> Option<&dyn MutableRecord> {
        None
    }

    fn previewable(&self) -> Option<&dyn Previewable> {
        None
    }
}

/// Caller-assigned identity, available once the owning record has been persisted.
pub trait Identifiable {
    fn id(&self) -> Option<String>;
}

/// Carries a pathname persisted once, at commit, for names that must not be recomputed.
pub trait PathAware {
    fn pathname(&self) -> Option<String>;

    /// Set-once. Setting the same value again is a no-op.
    fn set_pathname(&self, pathname: String) -> Result<(), RecordError>;

    /// Replace the pathname after the stored blob was moved by a migration.
    fn relocate(&self, pathname: String);
}

/// In-place metadata correction, used by refresh.
pub trait MutableRecord {
    fn apply(&self, update: MetadataUpdate);
}

/// Holds an optional derived preview record.
pub trait Previewable {
    fn preview(&self) -> Option<Arc<dyn FileRecord>>;

    fn set_preview(&self, preview: Option<Arc<dyn FileRecord>>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_taken_from_original_filename() {
        let meta = FileMetadata::new("holiday.photo.JPG", 10, "abc", "image/jpeg");
        assert_eq!(meta.extension(), Some("JPG"));

        let meta = FileMetadata::new("README", 10, "abc", "text/plain");
        assert_eq!(meta.extension(), None);
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut meta = FileMetadata::new("a.txt", 4, "old", "text/plain");
        let update = MetadataUpdate {
            content_hash: Some("new".to_string()),
            size_bytes: Some(8),
            ..Default::default()
        };
        update.apply_to(&mut meta);

        assert_eq!(meta.content_hash, "new");
        assert_eq!(meta.size_bytes, 8);
        assert_eq!(meta.original_filename, "a.txt");
        assert_eq!(meta.mime_type, "text/plain");
        assert!(meta.modified_at.is_none());
    }

    #[test]
    fn matches_content_requires_hash_and_size() {
        let meta = FileMetadata::new("a.txt", 4, "098f6bcd4621d373cade4e832627b4f6", "text/plain");
        assert!(meta.matches_content("098f6bcd4621d373cade4e832627b4f6", 4));
        assert!(!meta.matches_content("098f6bcd4621d373cade4e832627b4f6", 5));
        assert!(!meta.matches_content("other", 4));
    }
}
