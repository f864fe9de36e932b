pub mod fixtures;

use std::sync::Arc;

use depot_files::{DeterministicNaming, FileManager, InMemoryRepository};
use depot_storage::LocalStorage;
use tempfile::TempDir;

/// File manager over a throwaway local storage root.
pub struct TestDepot {
    pub manager: FileManager,
    pub storage: Arc<LocalStorage>,
    pub repository: Arc<InMemoryRepository>,
    pub root: TempDir,
    pub staging: TempDir,
}

impl TestDepot {
    /// Path of a stored blob on disk.
    pub fn blob_path(&self, pathname: &str) -> std::path::PathBuf {
        self.root.path().join(pathname)
    }
}

pub async fn setup_depot(naming: impl DeterministicNaming + 'static) -> TestDepot {
    let root = tempfile::tempdir().expect("Failed to create storage directory");
    let staging = tempfile::tempdir().expect("Failed to create staging directory");
    let storage = Arc::new(
        LocalStorage::new(root.path().to_path_buf())
            .await
            .expect("Failed to create local storage"),
    );
    let repository = Arc::new(InMemoryRepository::new());

    let manager = FileManager::builder(storage.clone(), naming)
        .name("test")
        .repository(repository.clone())
        .staging_dir(staging.path())
        .build();

    TestDepot {
        manager,
        storage,
        repository,
        root,
        staging,
    }
}
