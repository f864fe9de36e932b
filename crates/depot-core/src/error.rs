//! Error types module
//!
//! Errors raised while building components (`ConfigurationError`) and while mutating
//! records through their capability traits (`RecordError`). Runtime failures of the
//! upload pipeline live in `depot-files`, backend failures in `depot-storage`.

/// Invalid component parameters, raised at construction time.
///
/// Fatal to the setup of the component that raised it: a naming strategy, a storage
/// backend or the environment configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("{name} is required but not set")]
    Missing { name: &'static str },

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("split length {length} does not evenly divide {source_length}")]
    UnevenSplit { length: usize, source_length: usize },
}

impl ConfigurationError {
    pub fn missing(name: &'static str) -> Self {
        ConfigurationError::Missing { name }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ConfigurationError::Invalid {
            name,
            reason: reason.into(),
        }
    }
}

/// Capability violations on a file record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("pathname already persisted as '{existing}', refusing '{attempted}'")]
    PathnameAlreadySet { existing: String, attempted: String },

    #[error("identity already assigned ({existing})")]
    IdentityAlreadyAssigned { existing: String },
}
