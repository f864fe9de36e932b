//! Shared key validation for storage backends.

use crate::traits::{StorageError, StorageResult};

/// Validate a logical pathname before it reaches a backend.
///
/// Rejects empty keys, absolute keys, keys naming a directory and any `..` segment.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.starts_with('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            key
        )));
    }
    if key.ends_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key names a directory: {}",
            key
        )));
    }
    if key.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains a parent segment: {}",
            key
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_relative_keys() {
        assert!(validate_key("098f6bcd/4621d373/098f6bcd4621d373cade4e832627b4f6").is_ok());
        assert!(validate_key("1").is_ok());
        assert!(validate_key("files/a..b.txt").is_ok());
    }

    #[test]
    fn rejects_unsafe_keys() {
        for key in ["", "/etc/passwd", "a/../b", "..", "dir/", "a\\..\\b"] {
            assert!(
                matches!(validate_key(key), Err(StorageError::InvalidKey(_))),
                "key {:?} should be rejected",
                key
            );
        }
    }
}
