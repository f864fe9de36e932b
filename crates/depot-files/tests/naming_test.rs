use depot_core::{ConfigurationError, FileMetadata, PathAware, StoredFile};
use depot_files::naming::{
    AppendExtension, ChunkedIdNaming, DateNaming, HashNaming, HashSplitNaming, IdNaming,
    PersistedPath, Prefix, RandomUuidNaming, UuidV5Naming,
};
use depot_files::{DeterministicNaming, NamingSpec, NamingStrategy};

const HASH: &str = "098f6bcd4621d373cade4e832627b4f6";

fn record() -> StoredFile {
    StoredFile::with_id(1234, FileMetadata::new("report.pdf", 4, HASH, "application/pdf"))
}

#[test]
fn test_deterministic_strategies_repeat_themselves() {
    let strategies: Vec<Box<dyn DeterministicNaming>> = vec![
        Box::new(HashNaming),
        Box::new(IdNaming),
        Box::new(HashSplitNaming::new(4).unwrap()),
        Box::new(ChunkedIdNaming::new(2, 8).unwrap()),
        Box::new(DateNaming::default()),
        Box::new(UuidV5Naming::from_label("depot")),
        Box::new(Prefix::new("files", AppendExtension::new(HashNaming).unwrap()).unwrap()),
    ];
    let record = record();
    for naming in &strategies {
        let first = naming.pathname(&record).unwrap();
        for _ in 0..3 {
            assert_eq!(naming.pathname(&record).unwrap(), first);
        }
        assert!(!first.starts_with('/'));
    }
}

#[test]
fn test_split_of_six_is_a_configuration_error() {
    assert_eq!(
        HashSplitNaming::new(6).unwrap_err(),
        ConfigurationError::UnevenSplit {
            length: 6,
            source_length: 32,
        }
    );
    assert!("hash-split:6".parse::<NamingSpec>().unwrap().build().is_err());
}

#[test]
fn test_random_names_are_pinned_by_persisted_path() {
    let naming = PersistedPath::with_fallback(RandomUuidNaming);
    let record = StoredFile::new(FileMetadata::new("a.txt", 4, HASH, "text/plain"));

    let chosen = naming.pathname(&record).unwrap();
    record.set_pathname(chosen.clone()).unwrap();
    for _ in 0..3 {
        assert_eq!(naming.pathname(&record).unwrap(), chosen);
    }
}

#[test]
fn test_textual_spec_matches_direct_construction() {
    let built = "hash-split:8+ext"
        .parse::<NamingSpec>()
        .unwrap()
        .with_prefix(Some("docs".to_string()))
        .build()
        .unwrap();
    let direct = Prefix::new(
        "docs",
        AppendExtension::new(HashSplitNaming::new(8).unwrap()).unwrap(),
    )
    .unwrap();
    assert_eq!(
        built.pathname(&record()).unwrap(),
        direct.pathname(&record()).unwrap()
    );
}
