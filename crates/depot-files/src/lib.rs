//! Depot Files Library
//!
//! Content-addressed upload handling on top of `depot-storage`: uploads are hashed and
//! deduplicated, staged locally until the owning unit of work commits, then written to
//! storage under a pathname derived by a naming strategy.
//!
//! ```ignore
//! let mut manager = FileManager::new(storage, HashSplitNaming::new(8)?);
//! let handle = manager.upload(UploadSource::path("/tmp/photo.jpg")).await?;
//! let pathname = manager.commit(&handle).await?;
//! ```

pub mod content;
pub mod delegating;
pub mod error;
pub mod factory;
pub mod maintenance;
pub mod manager;
pub mod naming;
pub mod pending;
pub mod repository;
pub mod source;
pub mod url;

pub use content::{ContentInfo, ContentSniffer, FixedMime, MimeDetector};
pub use delegating::DelegatingManager;
pub use error::{FileError, FileResult};
pub use factory::{RecordFactory, StoredFileFactory};
pub use maintenance::{
    migrate_all, refresh_all, verify_all, MigrationReport, RefreshReport, VerifyReport,
};
pub use manager::{ContentInspection, FileHandle, FileManager, FileManagerBuilder};
pub use naming::{DeterministicNaming, NamingError, NamingSpec, NamingStrategy};
pub use pending::{PendingKey, PendingUploads};
pub use repository::{FileRepository, InMemoryRepository, RecordStream, RepositoryError};
pub use source::{StagedFile, UploadSource};
pub use url::{BaseUrlResolver, DelegatingUrlResolver, UrlResolver};
