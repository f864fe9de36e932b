use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use crate::error::ConfigurationError;

/// Storage backend types
///
/// Defined in core because configuration selects it before any backend crate is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    S3,
    Azure,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(StorageBackend::Local),
            "s3" => Ok(StorageBackend::S3),
            "azure" => Ok(StorageBackend::Azure),
            "memory" => Ok(StorageBackend::Memory),
            _ => Err(ConfigurationError::invalid(
                "DEPOT_STORAGE_BACKEND",
                format!("unknown storage backend '{}'", s),
            )),
        }
    }
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            StorageBackend::Local => write!(f, "local"),
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Azure => write!(f, "azure"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("S3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(" azure ".parse::<StorageBackend>().unwrap(), StorageBackend::Azure);
        assert!("nfs".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn display_round_trips_through_serde_names() {
        let json = serde_json::to_string(&StorageBackend::Memory).unwrap();
        assert_eq!(json, "\"memory\"");
        assert_eq!(StorageBackend::Local.to_string(), "local");
    }
}
