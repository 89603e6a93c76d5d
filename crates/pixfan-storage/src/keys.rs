//! Object key validation shared by all backends.

use crate::traits::{StorageError, StorageResult};

/// Reject keys that are empty, absolute, or that walk out of the bucket.
pub fn validate_key(key: &str) -> StorageResult<&str> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key must be relative: {}",
            key
        )));
    }
    if key.split(['/', '\\']).any(|segment| segment == ".." || segment == ".") {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains a relative segment: {}",
            key
        )));
    }
    if key.split('/').any(str::is_empty) {
        return Err(StorageError::InvalidKey(format!(
            "Storage key contains an empty segment: {}",
            key
        )));
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        assert_eq!(validate_key("photo1").unwrap(), "photo1");
        assert_eq!(validate_key("uploads/2024/out1.webp").unwrap(), "uploads/2024/out1.webp");
        assert!(validate_key("file..name.png").is_ok());
    }

    #[test]
    fn rejects_escaping_keys() {
        for key in ["", "/etc/passwd", "../secret", "a/../../b", "a//b", "a/", "./a", "a\\..\\b"] {
            assert!(
                matches!(validate_key(key), Err(StorageError::InvalidKey(_))),
                "{:?} should be rejected",
                key
            );
        }
    }
}
