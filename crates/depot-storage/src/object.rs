//! Object store backends (S3, Azure Blob) built on the `object_store` crate.

use crate::keys::validate_key;
use crate::traits::{ByteReader, ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use object_store::buffered::BufWriter;
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, Result as ObjectResult};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[cfg(feature = "storage-azure")]
use object_store::azure::{MicrosoftAzure, MicrosoftAzureBuilder};
#[cfg(feature = "storage-s3")]
use object_store::aws::{AmazonS3, AmazonS3Builder};

/// S3 (and S3-compatible) storage
#[cfg(feature = "storage-s3")]
pub type S3Storage = ObjectStorage<AmazonS3>;

/// Azure Blob Storage
#[cfg(feature = "storage-azure")]
pub type AzureStorage = ObjectStorage<MicrosoftAzure>;

/// Storage over any `object_store` implementation
///
/// `container` is the bucket or container name, used for logging only.
#[derive(Debug)]
pub struct ObjectStorage<S> {
    store: Arc<S>,
    container: String,
    backend: StorageBackend,
}

impl<S> Clone for ObjectStorage<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            container: self.container.clone(),
            backend: self.backend,
        }
    }
}

impl<S: ObjectStore> ObjectStorage<S> {
    /// Wrap an already built store
    pub fn from_store(store: S, container: impl Into<String>, backend: StorageBackend) -> Self {
        Self {
            store: Arc::new(store),
            container: container.into(),
            backend,
        }
    }

    fn location(key: &str) -> StorageResult<Path> {
        validate_key(key)?;
        Path::parse(key).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }

    fn map_read_error(&self, key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => StorageError::ReadFailed(other.to_string()),
        }
    }
}

#[cfg(feature = "storage-s3")]
impl ObjectStorage<AmazonS3> {
    /// Create a new S3 storage instance
    ///
    /// # Arguments
    /// * `bucket` - S3 bucket name
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    ///
    /// Credentials are read from the standard AWS environment variables.
    pub fn new(bucket: String, region: String, endpoint_url: Option<String>) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(region)
            .with_bucket_name(bucket.clone());

        if let Some(endpoint) = endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::from_store(store, bucket, StorageBackend::S3))
    }
}

#[cfg(feature = "storage-azure")]
impl ObjectStorage<MicrosoftAzure> {
    /// Create a new Azure Blob storage instance
    ///
    /// # Arguments
    /// * `account` - Storage account name (may be `None` with the emulator)
    /// * `container` - Blob container name
    /// * `access_key` - Optional shared key; otherwise credentials come from the environment
    /// * `use_emulator` - Target a local Azurite emulator
    pub fn new(
        account: Option<String>,
        container: String,
        access_key: Option<String>,
        use_emulator: bool,
    ) -> StorageResult<Self> {
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_container_name(container.clone())
            .with_use_emulator(use_emulator);

        if let Some(account) = account {
            builder = builder.with_account(account);
        }
        if let Some(key) = access_key {
            builder = builder.with_access_key(key);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(Self::from_store(store, container, StorageBackend::Azure))
    }
}

#[async_trait]
impl<S: ObjectStore> Storage for ObjectStorage<S> {
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let start = std::time::Instant::now();
        let location = Self::location(key)?;

        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| {
            let err = self.map_read_error(key, e);
            if !matches!(err, StorageError::NotFound(_)) {
                tracing::error!(
                    error = %err,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage read failed"
                );
            }
            err
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::ReadFailed(e.to_string()))?;

        tracing::info!(
            backend = %self.backend,
            container = %self.container,
            key = %key,
            size_bytes = bytes.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage read successful"
        );

        Ok(bytes.to_vec())
    }

    async fn read_stream(&self, key: &str) -> StorageResult<ByteStream> {
        let start = std::time::Instant::now();
        let location = Self::location(key)?;

        let result: ObjectResult<_> = self.store.get(&location).await;
        let result = result.map_err(|e| self.map_read_error(key, e))?;

        let container = self.container.clone();
        let key = key.to_string();
        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    container = %container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage stream read error"
                );
                Err(StorageError::ReadFailed(e.to_string()))
            }
        });

        Ok(Box::pin(stream))
    }

    async fn write(&self, key: &str, mut reader: ByteReader) -> StorageResult<u64> {
        let start = std::time::Instant::now();
        let location = Self::location(key)?;

        // Multipart upload once the buffer fills, single put otherwise.
        let store: Arc<dyn ObjectStore> = self.store.clone();
        let mut writer = BufWriter::new(store, location);

        let copied = tokio::io::copy(&mut reader, &mut writer).await;
        let bytes_written = match copied {
            Ok(n) => n,
            Err(e) => {
                let _ = writer.abort().await;
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage write failed"
                );
                return Err(StorageError::WriteFailed(e.to_string()));
            }
        };

        writer.shutdown().await.map_err(|e| {
            tracing::error!(
                error = %e,
                container = %self.container,
                key = %key,
                size_bytes = bytes_written,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage write failed"
            );
            StorageError::WriteFailed(e.to_string())
        })?;

        tracing::info!(
            backend = %self.backend,
            container = %self.container,
            key = %key,
            size_bytes = bytes_written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage write successful"
        );

        Ok(bytes_written)
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Self::location(key)?;

        let result: ObjectResult<_> = self.store.delete(&location).await;
        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage remove failed"
                );
                return Err(StorageError::RemoveFailed(e.to_string()));
            }
        }

        tracing::info!(
            backend = %self.backend,
            container = %self.container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage remove successful"
        );

        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let location = Self::location(key)?;
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn content_length(&self, key: &str) -> StorageResult<u64> {
        let location = Self::location(key)?;
        match self.store.head(&location).await {
            Ok(meta) => Ok(meta.size as u64),
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn copy(&self, from_key: &str, to_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let from = Self::location(from_key)?;
        let to = Self::location(to_key)?;

        let copy_result: ObjectResult<_> = self.store.copy(&from, &to).await;
        copy_result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(from_key.to_string()),
            other => StorageError::BackendError(other.to_string()),
        })?;

        tracing::info!(
            from_key = %from_key,
            to_key = %to_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage copy successful"
        );

        Ok(())
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
