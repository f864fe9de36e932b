#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::MemoryStorage;
#[cfg(feature = "storage-azure")]
use crate::AzureStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use depot_core::DepotConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &DepotConfig) -> StorageResult<Arc<dyn Storage>> {
    let backend = config.storage_backend;
    tracing::info!(backend = %backend, "Creating storage backend");

    match backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;

            let storage = S3Storage::new(bucket, region, config.s3_endpoint.clone())?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-azure")]
        StorageBackend::Azure => {
            let container = config.azure_container.clone().ok_or_else(|| {
                StorageError::ConfigError("AZURE_STORAGE_CONTAINER not configured".to_string())
            })?;

            let storage = AzureStorage::new(
                config.azure_account.clone(),
                container,
                config.azure_access_key.clone(),
                config.azure_use_emulator,
            )?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-azure"))]
        StorageBackend::Azure => Err(StorageError::ConfigError(
            "Azure storage backend not available (storage-azure feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("DEPOT_LOCAL_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => Ok(Arc::new(MemoryStorage::new())),
    }
}
