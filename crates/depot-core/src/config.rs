//! Configuration module
//!
//! Environment-driven settings for the storage backend, upload staging, naming and the
//! metadata database.

use std::env;
use std::path::PathBuf;

use crate::storage_types::StorageBackend;

const DB_MAX_CONNECTIONS: u32 = 10;
const BATCH_SIZE: usize = 100;
const DEFAULT_NAMING: &str = "hash-split:8";

/// Depot configuration, loaded from the process environment (and `.env`).
#[derive(Clone, Debug)]
pub struct DepotConfig {
    pub environment: String,
    // Storage configuration
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<PathBuf>,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, Spaces, ...)
    pub aws_region: Option<String>,
    pub azure_account: Option<String>,
    pub azure_container: Option<String>,
    pub azure_access_key: Option<String>,
    pub azure_use_emulator: bool,
    // Upload pipeline
    pub staging_dir: PathBuf,
    pub naming: String,
    pub naming_prefix: Option<String>,
    pub public_base_url: Option<String>,
    // Metadata database
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub batch_size: usize,
}

impl DepotConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. `from_env` passes the process environment.
    pub fn from_lookup<F>(var: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let storage_backend = match var("DEPOT_STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        let config = DepotConfig {
            environment,
            storage_backend,
            local_storage_path: non_empty("DEPOT_LOCAL_PATH").map(PathBuf::from),
            s3_bucket: non_empty("S3_BUCKET"),
            s3_region: non_empty("S3_REGION"),
            s3_endpoint: non_empty("S3_ENDPOINT"),
            aws_region: non_empty("AWS_REGION"),
            azure_account: non_empty("AZURE_STORAGE_ACCOUNT"),
            azure_container: non_empty("AZURE_STORAGE_CONTAINER"),
            azure_access_key: non_empty("AZURE_STORAGE_ACCESS_KEY"),
            azure_use_emulator: var("AZURE_USE_EMULATOR")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            staging_dir: non_empty("DEPOT_STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            naming: non_empty("DEPOT_NAMING").unwrap_or_else(|| DEFAULT_NAMING.to_string()),
            naming_prefix: non_empty("DEPOT_NAMING_PREFIX"),
            public_base_url: non_empty("DEPOT_PUBLIC_BASE_URL"),
            database_url: non_empty("DATABASE_URL"),
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_MAX_CONNECTIONS),
            batch_size: var("DEPOT_BATCH_SIZE")
                .and_then(|v| v.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(BATCH_SIZE),
        };

        config.validate()?;
        Ok(config)
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Region for S3, `S3_REGION` taking precedence over `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.s3_region.as_deref().or(self.aws_region.as_deref())
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        match self.storage_backend {
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "DEPOT_LOCAL_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region().is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Azure => {
                if self.azure_account.is_none() && !self.azure_use_emulator {
                    return Err(anyhow::anyhow!(
                        "AZURE_STORAGE_ACCOUNT must be set when using Azure storage backend"
                    ));
                }
                if self.azure_container.is_none() {
                    return Err(anyhow::anyhow!(
                        "AZURE_STORAGE_CONTAINER must be set when using Azure storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {
                if self.is_production() {
                    return Err(anyhow::anyhow!(
                        "memory storage backend cannot be used in production"
                    ));
                }
            }
        }

        if let Some(ref prefix) = self.naming_prefix {
            if prefix.starts_with('/') {
                return Err(anyhow::anyhow!(
                    "DEPOT_NAMING_PREFIX must be relative, got '{}'",
                    prefix
                ));
            }
        }

        if let Some(ref url) = self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<DepotConfig, anyhow::Error> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DepotConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_apply_for_local_backend() {
        let config = load(&[("DEPOT_LOCAL_PATH", "/var/lib/depot")]).unwrap();

        assert_eq!(config.storage_backend, StorageBackend::Local);
        assert_eq!(config.naming, "hash-split:8");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.environment, "development");
        assert!(!config.is_production());
    }

    #[test]
    fn local_backend_requires_path() {
        let err = load(&[]).unwrap_err();
        assert!(err.to_string().contains("DEPOT_LOCAL_PATH"));
    }

    #[test]
    fn s3_region_falls_back_to_aws_region() {
        let config = load(&[
            ("DEPOT_STORAGE_BACKEND", "s3"),
            ("S3_BUCKET", "uploads"),
            ("AWS_REGION", "eu-west-1"),
        ])
        .unwrap();
        assert_eq!(config.s3_region(), Some("eu-west-1"));

        let err = load(&[("DEPOT_STORAGE_BACKEND", "s3"), ("S3_BUCKET", "uploads")]).unwrap_err();
        assert!(err.to_string().contains("S3_REGION"));
    }

    #[test]
    fn azure_requires_container() {
        let err = load(&[
            ("DEPOT_STORAGE_BACKEND", "azure"),
            ("AZURE_STORAGE_ACCOUNT", "acct"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("AZURE_STORAGE_CONTAINER"));
    }

    #[test]
    fn memory_backend_is_rejected_in_production() {
        assert!(load(&[("DEPOT_STORAGE_BACKEND", "memory")]).is_ok());
        let err = load(&[("DEPOT_STORAGE_BACKEND", "memory"), ("APP_ENV", "prod")]).unwrap_err();
        assert!(err.to_string().contains("production"));
    }

    #[test]
    fn unknown_backend_is_an_error() {
        assert!(load(&[("DEPOT_STORAGE_BACKEND", "ftp")]).is_err());
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let config = load(&[
            ("DEPOT_STORAGE_BACKEND", "memory"),
            ("DB_MAX_CONNECTIONS", "many"),
            ("DEPOT_BATCH_SIZE", "0"),
        ])
        .unwrap();
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.batch_size, 100);
    }

    #[test]
    fn database_url_must_be_postgres() {
        let err = load(&[
            ("DEPOT_STORAGE_BACKEND", "memory"),
            ("DATABASE_URL", "mysql://localhost/depot"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }
}
