//! Depot Core Library
//!
//! This crate provides the file record model, capability traits, error types and
//! configuration shared by every Depot component.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::DepotConfig;
pub use error::{ConfigurationError, RecordError};
pub use models::{
    FileMetadata, FileRecord, Identifiable, MetadataUpdate, MutableRecord, PathAware,
    Previewable, StoredFile,
};
// Note: Storage, StorageError, StorageResult live in the depot-storage crate
pub use storage_types::StorageBackend;
