use depot_core::{ConfigurationError, FileRecord};

use super::{split, DeterministicNaming, NamingError, NamingResult, NamingStrategy};

fn refuse_persisted<N: NamingStrategy>(
    decorator: &'static str,
    inner: &N,
) -> Result<(), ConfigurationError> {
    if inner.replays_persisted_path() {
        return Err(ConfigurationError::invalid(
            "naming",
            format!(
                "{} cannot wrap a persisted-path strategy; decorate its fallback instead",
                decorator
            ),
        ));
    }
    Ok(())
}

/// Prepends a fixed directory to the inner strategy's directory.
#[derive(Debug, Clone)]
pub struct Prefix<N> {
    prefix: String,
    inner: N,
}

impl<N: NamingStrategy> Prefix<N> {
    /// `prefix` must be relative; a trailing `/` is added if missing.
    pub fn new(prefix: impl Into<String>, inner: N) -> Result<Self, ConfigurationError> {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigurationError::invalid("naming prefix", "prefix is empty"));
        }
        if trimmed.starts_with('/') {
            return Err(ConfigurationError::invalid(
                "naming prefix",
                format!("'{}' must be relative", prefix),
            ));
        }
        if trimmed.split('/').any(|segment| segment == ".." || segment.is_empty()) {
            return Err(ConfigurationError::invalid(
                "naming prefix",
                format!("'{}' contains an empty or parent segment", prefix),
            ));
        }
        refuse_persisted("prefix", &inner)?;
        Ok(Self {
            prefix: format!("{}/", trimmed),
            inner,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn apply(&self, directory: Option<String>) -> String {
        match directory {
            Some(dir) => format!("{}{}", self.prefix, dir.trim_start_matches('/')),
            None => self.prefix.clone(),
        }
    }
}

impl<N: NamingStrategy> NamingStrategy for Prefix<N> {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(Some(self.apply(self.inner.directory_name(record)?)))
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        self.inner.file_name(record)
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        let inner = self.inner.pathname(record)?;
        Ok(format!("{}{}", self.prefix, inner.trim_start_matches('/')))
    }
}

impl<N: DeterministicNaming> DeterministicNaming for Prefix<N> {}

/// Drops the inner strategy's directory.
#[derive(Debug, Clone)]
pub struct Flat<N> {
    inner: N,
}

impl<N: NamingStrategy> Flat<N> {
    pub fn new(inner: N) -> Result<Self, ConfigurationError> {
        refuse_persisted("flat", &inner)?;
        Ok(Self { inner })
    }
}

impl<N: NamingStrategy> NamingStrategy for Flat<N> {
    fn directory_name(&self, _record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(None)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        self.inner.file_name(record)
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        self.inner.file_name(record)
    }
}

impl<N: DeterministicNaming> DeterministicNaming for Flat<N> {}

/// Appends the original filename's extension to the inner file name.
#[derive(Debug, Clone)]
pub struct AppendExtension<N> {
    inner: N,
}

impl<N: NamingStrategy> AppendExtension<N> {
    pub fn new(inner: N) -> Result<Self, ConfigurationError> {
        refuse_persisted("append-extension", &inner)?;
        Ok(Self { inner })
    }

    fn apply(&self, record: &dyn FileRecord, mut name: String) -> String {
        if let Some(extension) = record.metadata().extension() {
            name.push('.');
            name.push_str(extension);
        }
        name
    }
}

impl<N: NamingStrategy> NamingStrategy for AppendExtension<N> {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        self.inner.directory_name(record)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        Ok(self.apply(record, self.inner.file_name(record)?))
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        Ok(self.apply(record, self.inner.pathname(record)?))
    }
}

impl<N: DeterministicNaming> DeterministicNaming for AppendExtension<N> {}

/// Replays the pathname persisted on a path-aware record.
///
/// Without a fallback, a record that has no persisted pathname cannot be named. With a
/// fallback, such a record is named by the fallback once; the file manager persists that
/// pathname on the record at commit, and every later resolution replays it. Records that
/// are not path-aware are always rejected, which is what makes the pair deterministic even
/// over a random fallback.
#[derive(Debug, Clone)]
pub struct PersistedPath<N = super::HashNaming> {
    fallback: Option<N>,
}

impl PersistedPath {
    pub fn new() -> Self {
        Self { fallback: None }
    }
}

impl Default for PersistedPath {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: NamingStrategy> PersistedPath<N> {
    pub fn with_fallback(fallback: N) -> Self {
        Self {
            fallback: Some(fallback),
        }
    }

    fn resolve(&self, record: &dyn FileRecord) -> NamingResult<String> {
        let path_aware = record.path_aware().ok_or_else(|| NamingError::NotPathAware {
            record_type: record.type_name().to_string(),
        })?;
        if let Some(pathname) = path_aware.pathname() {
            return Ok(pathname);
        }
        match self.fallback {
            Some(ref fallback) => fallback.pathname(record),
            None => Err(NamingError::MissingPathname {
                record_type: record.type_name().to_string(),
            }),
        }
    }
}

impl<N: NamingStrategy> NamingStrategy for PersistedPath<N> {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(split(&self.resolve(record)?).0)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        Ok(split(&self.resolve(record)?).1)
    }

    fn pathname(&self, record: &dyn FileRecord) -> NamingResult<String> {
        self.resolve(record)
    }

    fn replays_persisted_path(&self) -> bool {
        true
    }
}

impl<N: NamingStrategy> DeterministicNaming for PersistedPath<N> {}
