//! File record model.

pub mod record;
pub mod stored_file;

pub use record::{
    FileMetadata, FileRecord, Identifiable, MetadataUpdate, MutableRecord, PathAware, Previewable,
};
pub use stored_file::StoredFile;
