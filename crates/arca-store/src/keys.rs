//! Backend key validation.
//!
//! Valid keys:
//! - Must be non-empty and at most 128 bytes
//! - Must consist of ASCII letters, digits, `-` and `_`
//!
//! Keys map directly to file names in [`DiskKv`](crate::DiskKv), so anything
//! that could name a directory (`.`, `..`, separators) is rejected.

use crate::error::{StoreError, StoreResult};

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 128;

/// Validate a backend key, returning `Ok(())` if valid.
///
/// # Examples
///
/// ```
/// use arca_store::keys::validate_key;
///
/// assert!(validate_key("deadbeef").is_ok());
/// assert!(validate_key("staging-0192").is_ok());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("../etc").is_err());
/// ```
pub fn validate_key(key: &str) -> StoreResult<()> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.into(),
    };

    if key.is_empty() {
        return Err(invalid("key must not be empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid("key is too long"));
    }
    if let Some(ch) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_')))
    {
        return Err(invalid(&format!("contains forbidden character: {ch:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hex_ids() {
        assert!(validate_key("0a1b2c3d").is_ok());
        assert!(validate_key(&"f".repeat(64)).is_ok());
    }

    #[test]
    fn rejects_path_separators() {
        assert!(validate_key("a/b").is_err());
        assert!(validate_key("a\\b").is_err());
    }

    #[test]
    fn rejects_dots() {
        assert!(validate_key(".tmp").is_err());
        assert!(validate_key("..").is_err());
        assert!(validate_key("ab..cd").is_err());
    }

    #[test]
    fn rejects_overlong_keys() {
        assert!(validate_key(&"a".repeat(MAX_KEY_LEN + 1)).is_err());
        assert!(validate_key(&"a".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[test]
    fn rejects_non_ascii() {
        let err = validate_key("clé").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }
}
