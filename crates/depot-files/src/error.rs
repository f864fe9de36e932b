//! Errors raised by the upload pipeline.

use depot_core::{ConfigurationError, RecordError};
use depot_storage::StorageError;

use crate::naming::NamingError;
use crate::repository::RepositoryError;

/// File manager errors.
///
/// Every variant is surfaced to the immediate caller; nothing here is retried.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Commit of a record that is not staged (never uploaded, already committed, deduplicated
    /// against a durable record, or discarded by `clear`).
    #[error("record is not pending: {0}")]
    NotPending(String),

    #[error("pending upload not found: {0}")]
    NotFound(String),

    /// The record has no durable pathname yet.
    #[error("record is still pending: {0}")]
    StillPending(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("MIME detection failed: {0}")]
    MimeDetection(String),

    #[error("no file manager registered for record type {0}")]
    NoManager(String),

    #[error("no URL resolver registered for record type {0}")]
    NoResolver(String),

    #[error(transparent)]
    Naming(#[from] NamingError),

    /// The record lacks a capability the operation needs.
    #[error("{operation} requires a {capability} record, got {record_type}")]
    Unsupported {
        operation: &'static str,
        capability: &'static str,
        record_type: String,
    },

    #[error("staging I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Record(#[from] RecordError),
}

pub type FileResult<T> = Result<T, FileError>;
