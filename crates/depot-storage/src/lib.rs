//! Depot Storage Library
//!
//! This crate provides the blob storage abstraction used by the file manager and its
//! implementations for the local filesystem, process memory, S3 and Azure Blob Storage.
//!
//! # Storage key format
//!
//! Keys are logical pathnames produced by a naming strategy, e.g.
//! `098f6bcd/4621d373/cade4e83/2627b4f6/098f6bcd4621d373cade4e832627b4f6`. Every backend
//! uses the key verbatim as its object name.
//!
//! Keys must be non-empty, must not contain a `..` segment, a leading `/` or a trailing `/`.
//! Validation is centralized in the `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(any(feature = "storage-s3", feature = "storage-azure"))]
pub mod object;
pub mod traits;

// Re-export commonly used types
pub use depot_core::StorageBackend;
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
#[cfg(feature = "storage-azure")]
pub use object::AzureStorage;
#[cfg(any(feature = "storage-s3", feature = "storage-azure"))]
pub use object::ObjectStorage;
#[cfg(feature = "storage-s3")]
pub use object::S3Storage;
pub use traits::{ByteReader, ByteStream, Storage, StorageError, StorageResult};
