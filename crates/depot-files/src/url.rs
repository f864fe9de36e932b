//! Public URLs for stored files.

use std::any::{Any, TypeId};

use depot_core::{ConfigurationError, DepotConfig, FileRecord};

use crate::error::{FileError, FileResult};
use crate::naming::{DeterministicNaming, NamingSpec, NamingStrategy};

pub trait UrlResolver: Send + Sync {
    fn url(&self, record: &dyn FileRecord) -> FileResult<String>;
}

/// Joins a base URL with the pathname a naming strategy gives the record.
///
/// Share the manager's strategy (e.g. through an `Arc`) so URLs match where files are stored.
pub struct BaseUrlResolver {
    base_url: String,
    naming: Box<dyn DeterministicNaming>,
}

impl BaseUrlResolver {
    pub fn new(base_url: impl Into<String>, naming: impl DeterministicNaming + 'static) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            naming: Box::new(naming),
        }
    }

    /// Resolver for `DEPOT_PUBLIC_BASE_URL` and the configured naming, if a base URL is set.
    pub fn from_config(config: &DepotConfig) -> Result<Option<Self>, ConfigurationError> {
        let Some(base_url) = config.public_base_url.as_deref() else {
            return Ok(None);
        };
        let naming = NamingSpec::from_config(config)?.build()?;
        Ok(Some(Self::new(base_url, naming)))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl UrlResolver for BaseUrlResolver {
    fn url(&self, record: &dyn FileRecord) -> FileResult<String> {
        let pathname = self.naming.pathname(record)?;
        Ok(format!("{}/{}", self.base_url, pathname.trim_start_matches('/')))
    }
}

impl std::fmt::Debug for BaseUrlResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseUrlResolver")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Picks a resolver by concrete record type, first registration wins.
#[derive(Default)]
pub struct DelegatingUrlResolver {
    routes: Vec<(TypeId, Box<dyn UrlResolver>)>,
}

impl DelegatingUrlResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: FileRecord>(mut self, resolver: impl UrlResolver + 'static) -> Self {
        self.routes.push((TypeId::of::<T>(), Box::new(resolver)));
        self
    }
}

impl UrlResolver for DelegatingUrlResolver {
    fn url(&self, record: &dyn FileRecord) -> FileResult<String> {
        let type_id = Any::type_id(record.as_any());
        self.routes
            .iter()
            .find(|(id, _)| *id == type_id)
            .ok_or_else(|| FileError::NoResolver(record.type_name().to_string()))?
            .1
            .url(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{HashSplitNaming, IdNaming};
    use depot_core::{FileMetadata, StoredFile};
    use std::sync::Arc;

    const HASH: &str = "098f6bcd4621d373cade4e832627b4f6";

    #[derive(Debug)]
    struct Unrouted(FileMetadata);

    impl FileRecord for Unrouted {
        fn metadata(&self) -> FileMetadata {
            self.0.clone()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn joins_base_and_pathname() {
        let naming = Arc::new(HashSplitNaming::new(16).unwrap());
        let resolver = BaseUrlResolver::new("https://cdn.example.com/files/", naming);
        let file = StoredFile::new(FileMetadata::new("a.txt", 4, HASH, "text/plain"));
        assert_eq!(
            resolver.url(&file).unwrap(),
            format!(
                "https://cdn.example.com/files/098f6bcd4621d373/cade4e832627b4f6/{}",
                HASH
            )
        );
    }

    fn config(vars: &[(&str, &str)]) -> DepotConfig {
        let map: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DepotConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    #[test]
    fn resolver_from_config_uses_configured_naming() {
        let resolver = BaseUrlResolver::from_config(&config(&[
            ("DEPOT_LOCAL_PATH", "/var/lib/depot"),
            ("DEPOT_NAMING", "hash"),
            ("DEPOT_NAMING_PREFIX", "media"),
            ("DEPOT_PUBLIC_BASE_URL", "https://cdn.example.com/"),
        ]))
        .unwrap()
        .unwrap();
        let file = StoredFile::new(FileMetadata::new("a.txt", 4, HASH, "text/plain"));
        assert_eq!(
            resolver.url(&file).unwrap(),
            format!("https://cdn.example.com/media/{}", HASH)
        );

        let unset = config(&[("DEPOT_LOCAL_PATH", "/var/lib/depot")]);
        assert!(BaseUrlResolver::from_config(&unset).unwrap().is_none());
    }

    #[test]
    fn naming_failures_surface() {
        let resolver = BaseUrlResolver::new("https://cdn.example.com", IdNaming);
        let file = StoredFile::new(FileMetadata::new("a.txt", 4, HASH, "text/plain"));
        assert!(matches!(resolver.url(&file), Err(FileError::Naming(_))));
    }

    #[test]
    fn delegating_resolver_routes_by_type() {
        let resolver = DelegatingUrlResolver::new()
            .register::<StoredFile>(BaseUrlResolver::new("https://a.example", IdNaming));

        let file = StoredFile::with_id(3, FileMetadata::new("a.txt", 4, HASH, "text/plain"));
        assert_eq!(resolver.url(&file).unwrap(), "https://a.example/3");

        let other = Unrouted(FileMetadata::new("a.txt", 4, HASH, "text/plain"));
        assert!(matches!(
            resolver.url(&other),
            Err(FileError::NoResolver(_))
        ));
    }
}
