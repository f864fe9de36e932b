//! Naming strategies: derive a storage pathname from a file record.
//!
//! A strategy yields an optional directory (ending with `/`) and a file name; the pathname is
//! their concatenation. Strategies compose as decorators over an inner strategy.
//!
//! Only [`DeterministicNaming`] strategies can drive a [`FileManager`](crate::FileManager).
//! [`RandomUuidNaming`] is not deterministic and reaches a manager only through
//! [`PersistedPath::with_fallback`], which replays the pathname stored on the record.

mod decorators;
mod delegating;
mod spec;
mod strategies;

use std::sync::Arc;

use depot_core::FileRecord;

pub use decorators::{AppendExtension, Flat, PersistedPath, Prefix};
pub use delegating::DelegatingNaming;
pub use spec::{NamingKind, NamingSpec};
pub use strategies::{
    ChunkedIdNaming, DateNaming, HashNaming, HashSplitNaming, IdNaming, RandomUuidNaming,
    UuidV5Naming,
};

/// Why a pathname could not be derived for a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    /// The strategy names files by identity and the record has none (yet).
    #[error("record {record_type} has no identity")]
    MissingIdentity { record_type: String },

    #[error("record {record_type} has no persisted pathname")]
    MissingPathname { record_type: String },

    #[error("record {record_type} cannot carry a persisted pathname")]
    NotPathAware { record_type: String },

    #[error("no naming strategy registered for record type {record_type}")]
    NoResolver { record_type: String },

    #[error("cannot name record: {0}")]
    Invalid(String),
}

pub type NamingResult<T> = Result<T, NamingError>;

/// Derives `directory + file name` for a record.
pub trait NamingStrategy: Send + Sync {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>>;

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String>;

    /// Full logical pathname.
    ///
    /// Resolves the directory and file name in one derivation; callers that need both should
    /// use this rather than concatenating the two calls.
    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        let directory = self.directory_name(record)?;
        let file_name = self.file_name(record)?;
        Ok(join(directory, &file_name))
    }

    /// True when the pathname is read back from the record rather than derived.
    ///
    /// Such a strategy must be outermost: decorators refuse to wrap it.
    fn replays_persisted_path(&self) -> bool {
        false
    }
}

/// Marker for strategies that return the same pathname for the same record on every call.
pub trait DeterministicNaming: NamingStrategy {}

impl<N: NamingStrategy + ?Sized> NamingStrategy for Box<N> {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        (**self).directory_name(record)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        (**self).file_name(record)
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        (**self).pathname(record)
    }

    fn replays_persisted_path(&self) -> bool {
        (**self).replays_persisted_path()
    }
}

impl<N: DeterministicNaming + ?Sized> DeterministicNaming for Box<N> {}

impl<N: NamingStrategy + ?Sized> NamingStrategy for Arc<N> {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        (**self).directory_name(record)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        (**self).file_name(record)
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        (**self).pathname(record)
    }

    fn replays_persisted_path(&self) -> bool {
        (**self).replays_persisted_path()
    }
}

impl<N: DeterministicNaming + ?Sized> DeterministicNaming for Arc<N> {}

/// `directory + file_name`, with an absent directory meaning the namespace root.
pub(crate) fn join(directory: Option<String>, file_name: &str) -> String {
    match directory {
        Some(mut dir) => {
            dir.push_str(file_name);
            dir
        }
        None => file_name.to_string(),
    }
}

/// Split a pathname after its last `/` into `(directory, file name)`.
pub(crate) fn split(pathname: &str) -> (Option<String>, String) {
    match pathname.rfind('/') {
        Some(pos) => (
            Some(pathname[..=pos].to_string()),
            pathname[pos + 1..].to_string(),
        ),
        None => (None, pathname.to_string()),
    }
}

/// Cut `source` into `length`-sized segments, each followed by `/`.
pub(crate) fn chunk_directory(source: &str, length: usize) -> String {
    let mut directory = String::with_capacity(source.len() + source.len() / length.max(1));
    for (i, c) in source.chars().enumerate() {
        directory.push(c);
        if (i + 1) % length == 0 {
            directory.push('/');
        }
    }
    directory
}
