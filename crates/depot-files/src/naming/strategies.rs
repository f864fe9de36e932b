use chrono::format::{Item, StrftimeItems};
use depot_core::{ConfigurationError, FileRecord};
use uuid::Uuid;

use super::{chunk_directory, DeterministicNaming, NamingError, NamingResult, NamingStrategy};

/// Length of an MD5 hex digest.
const HASH_LENGTH: usize = 32;

fn record_id(record: &dyn FileRecord) -> NamingResult<String> {
    record
        .identifiable()
        .and_then(|identifiable| identifiable.id())
        .ok_or_else(|| NamingError::MissingIdentity {
            record_type: record.type_name().to_string(),
        })
}

/// Flat namespace, file named by content hash.
#[derive(Debug, Clone, Copy, Default)]
pub struct HashNaming;

impl NamingStrategy for HashNaming {
    fn directory_name(&self, _record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(None)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        Ok(record.metadata().content_hash)
    }
}

impl DeterministicNaming for HashNaming {}

/// Flat namespace, file named by the record's identity.
///
/// Only resolvable once the identity is assigned, i.e. at commit time at the earliest.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdNaming;

impl NamingStrategy for IdNaming {
    fn directory_name(&self, _record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(None)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        record_id(record)
    }
}

impl DeterministicNaming for IdNaming {}

/// Nested directories cut from the content hash, file named by the full hash.
///
/// With a chunk of 8, hash `098f6bcd4621d373cade4e832627b4f6` lands in
/// `098f6bcd/4621d373/cade4e83/2627b4f6/`.
#[derive(Debug, Clone, Copy)]
pub struct HashSplitNaming {
    chunk: usize,
}

impl HashSplitNaming {
    pub fn new(chunk: usize) -> Result<Self, ConfigurationError> {
        if chunk == 0 || HASH_LENGTH % chunk != 0 {
            return Err(ConfigurationError::UnevenSplit {
                length: chunk,
                source_length: HASH_LENGTH,
            });
        }
        Ok(Self { chunk })
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }
}

impl NamingStrategy for HashSplitNaming {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        let hash = record.metadata().content_hash;
        if hash.len() % self.chunk != 0 {
            return Err(NamingError::Invalid(format!(
                "hash of length {} cannot be split into chunks of {}",
                hash.len(),
                self.chunk
            )));
        }
        Ok(Some(chunk_directory(&hash, self.chunk)))
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        Ok(record.metadata().content_hash)
    }
}

impl DeterministicNaming for HashSplitNaming {}

/// Directories cut from the zero-padded identity, file named by the identity.
///
/// With chunk 3 and width 9, identity `1234` is stored as `000/001/1234`: the padded
/// identity `000001234` is split into segments and the last one is left out.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedIdNaming {
    chunk: usize,
    width: usize,
}

impl ChunkedIdNaming {
    pub fn new(chunk: usize, width: usize) -> Result<Self, ConfigurationError> {
        if chunk == 0 || width == 0 || width % chunk != 0 {
            return Err(ConfigurationError::UnevenSplit {
                length: chunk,
                source_length: width,
            });
        }
        Ok(Self { chunk, width })
    }
}

impl NamingStrategy for ChunkedIdNaming {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        let id = record_id(record)?;
        if !id.is_ascii() {
            return Err(NamingError::Invalid(format!(
                "identity '{}' is not ASCII",
                id
            )));
        }
        if id.len() > self.width {
            return Err(NamingError::Invalid(format!(
                "identity '{}' is wider than {} characters",
                id, self.width
            )));
        }
        let padded = format!("{:0>width$}", id, width = self.width);
        let parents = &padded[..self.width - self.chunk];
        if parents.is_empty() {
            return Ok(None);
        }
        Ok(Some(chunk_directory(parents, self.chunk)))
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        record_id(record)
    }
}

impl DeterministicNaming for ChunkedIdNaming {}

/// Directory from the creation timestamp, file named by content hash.
#[derive(Debug, Clone)]
pub struct DateNaming {
    pattern: String,
}

impl DateNaming {
    pub const DEFAULT_PATTERN: &'static str = "%Y/%m/%d/";

    /// `pattern` is a chrono strftime pattern and is validated here.
    pub fn new(pattern: impl Into<String>) -> Result<Self, ConfigurationError> {
        let pattern = pattern.into();
        if pattern.is_empty() {
            return Err(ConfigurationError::invalid("date pattern", "pattern is empty"));
        }
        if pattern.starts_with('/') {
            return Err(ConfigurationError::invalid(
                "date pattern",
                format!("'{}' must not start with '/'", pattern),
            ));
        }
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(ConfigurationError::invalid(
                "date pattern",
                format!("'{}' is not a valid strftime pattern", pattern),
            ));
        }
        Ok(Self { pattern })
    }
}

impl Default for DateNaming {
    fn default() -> Self {
        Self {
            pattern: Self::DEFAULT_PATTERN.to_string(),
        }
    }
}

impl NamingStrategy for DateNaming {
    fn directory_name(&self, record: &dyn FileRecord) -> NamingResult<Option<String>> {
        let mut directory = record.metadata().created_at.format(&self.pattern).to_string();
        if !directory.ends_with('/') {
            directory.push('/');
        }
        Ok(Some(directory))
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        Ok(record.metadata().content_hash)
    }
}

impl DeterministicNaming for DateNaming {}

/// Name-based UUID (v5) of the content hash under a fixed namespace.
#[derive(Debug, Clone, Copy)]
pub struct UuidV5Naming {
    namespace: Uuid,
}

impl UuidV5Naming {
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }

    /// Namespace given as a UUID, or derived from an arbitrary label.
    pub fn from_label(label: &str) -> Self {
        let namespace = Uuid::parse_str(label)
            .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, label.as_bytes()));
        Self::new(namespace)
    }
}

impl NamingStrategy for UuidV5Naming {
    fn directory_name(&self, _record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(None)
    }

    fn file_name(&self, record: &dyn FileRecord) -> NamingResult<String> {
        let hash = record.metadata().content_hash;
        Ok(Uuid::new_v5(&self.namespace, hash.as_bytes()).to_string())
    }
}

impl DeterministicNaming for UuidV5Naming {}

/// Fresh random UUID (v4) on every call.
///
/// Not deterministic: wrap in [`PersistedPath::with_fallback`](super::PersistedPath::with_fallback)
/// so the first derived name is stored on the record and replayed afterwards.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomUuidNaming;

impl NamingStrategy for RandomUuidNaming {
    fn directory_name(&self, _record: &dyn FileRecord) -> NamingResult<Option<String>> {
        Ok(None)
    }

    fn file_name(&self, _record: &dyn FileRecord) -> NamingResult<String> {
        Ok(Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use depot_core::{FileMetadata, StoredFile};

    const HASH: &str = "098f6bcd4621d373cade4e832627b4f6";

    fn file() -> StoredFile {
        let mut meta = FileMetadata::new("test.txt", 4, HASH, "text/plain");
        meta.created_at = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        StoredFile::new(meta)
    }

    #[test]
    fn hash_split_by_eight_is_four_levels_deep() {
        let naming = HashSplitNaming::new(8).unwrap();
        let record = file();
        for _ in 0..2 {
            assert_eq!(
                naming.directory_name(&record).unwrap().as_deref(),
                Some("098f6bcd/4621d373/cade4e83/2627b4f6/")
            );
            assert_eq!(naming.file_name(&record).unwrap(), HASH);
        }
        assert_eq!(
            naming.pathname(&record).unwrap(),
            format!("098f6bcd/4621d373/cade4e83/2627b4f6/{}", HASH)
        );
    }

    #[test]
    fn hash_split_rejects_non_dividing_length() {
        assert_eq!(
            HashSplitNaming::new(6).unwrap_err(),
            ConfigurationError::UnevenSplit {
                length: 6,
                source_length: 32
            }
        );
        assert!(HashSplitNaming::new(0).is_err());
        for ok in [1, 2, 4, 8, 16, 32] {
            assert!(HashSplitNaming::new(ok).is_ok());
        }
    }

    #[test]
    fn hash_naming_is_flat() {
        assert_eq!(HashNaming.pathname(&file()).unwrap(), HASH);
    }

    #[test]
    fn id_naming_needs_identity() {
        let record = file();
        assert!(matches!(
            IdNaming.file_name(&record),
            Err(NamingError::MissingIdentity { .. })
        ));
        record.assign_id(1).unwrap();
        assert_eq!(IdNaming.pathname(&record).unwrap(), "1");
    }

    #[test]
    fn chunked_id_pads_and_splits() {
        let naming = ChunkedIdNaming::new(3, 9).unwrap();
        let record = file();
        record.assign_id(1234).unwrap();
        assert_eq!(naming.pathname(&record).unwrap(), "000/001/1234");

        let single = ChunkedIdNaming::new(4, 4).unwrap();
        assert_eq!(single.pathname(&record).unwrap(), "1234");

        assert!(ChunkedIdNaming::new(2, 9).is_err());
    }

    #[test]
    fn chunked_id_rejects_overflowing_identity() {
        let naming = ChunkedIdNaming::new(2, 4).unwrap();
        let record = file();
        record.assign_id(123_456).unwrap();
        assert!(matches!(
            naming.directory_name(&record),
            Err(NamingError::Invalid(_))
        ));
    }

    #[derive(Debug)]
    struct Labelled(FileMetadata, &'static str);

    impl FileRecord for Labelled {
        fn metadata(&self) -> FileMetadata {
            self.0.clone()
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn identifiable(&self) -> Option<&dyn depot_core::Identifiable> {
            Some(self)
        }
    }

    impl depot_core::Identifiable for Labelled {
        fn id(&self) -> Option<String> {
            Some(self.1.to_string())
        }
    }

    #[test]
    fn chunked_id_rejects_non_ascii_identity() {
        let naming = ChunkedIdNaming::new(1, 3).unwrap();
        let record = Labelled(file().metadata(), "éa");
        assert!(matches!(
            naming.directory_name(&record),
            Err(NamingError::Invalid(_))
        ));

        let ascii = Labelled(file().metadata(), "ab");
        assert_eq!(naming.pathname(&ascii).unwrap(), "0/a/ab");
    }

    #[test]
    fn date_naming_uses_creation_time() {
        let record = file();
        assert_eq!(
            DateNaming::default().pathname(&record).unwrap(),
            format!("2024/03/09/{}", HASH)
        );
        let monthly = DateNaming::new("%Y-%m").unwrap();
        assert_eq!(
            monthly.directory_name(&record).unwrap().as_deref(),
            Some("2024-03/")
        );
    }

    #[test]
    fn date_naming_validates_pattern() {
        assert!(DateNaming::new("").is_err());
        assert!(DateNaming::new("%Y/%Q/").is_err());
        assert!(DateNaming::new("/%Y/").is_err());
    }

    #[test]
    fn uuid_v5_is_stable_per_hash() {
        let naming = UuidV5Naming::from_label("depot");
        let a = naming.file_name(&file()).unwrap();
        let b = naming.file_name(&file()).unwrap();
        assert_eq!(a, b);
        assert_eq!(Uuid::parse_str(&a).unwrap().get_version_num(), 5);

        let other = UuidV5Naming::new(Uuid::NAMESPACE_DNS);
        assert_ne!(other.file_name(&file()).unwrap(), a);
    }

    #[test]
    fn random_uuid_changes_every_call() {
        let record = file();
        let a = RandomUuidNaming.file_name(&record).unwrap();
        let b = RandomUuidNaming.file_name(&record).unwrap();
        assert_ne!(a, b);
    }
}
