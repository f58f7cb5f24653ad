use std::fmt;

/// Key prefix shared by every provisional blob key.
pub const STAGING_PREFIX: &str = "staging-";

/// Provisional blob key used during streaming ingestion.
///
/// The content identifier of a stream is only known once the whole stream has
/// been hashed, so the bytes land under a `StagingKey` first and are moved to
/// their final key afterwards. Staging keys are UUID v7 based, so stale ones
/// left behind by a crash sort by creation time and are recognizable by
/// [`STAGING_PREFIX`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StagingKey(uuid::Uuid);

impl StagingKey {
    /// Generate a new time-ordered staging key.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// The backend key string, e.g. `staging-01920c4e...`.
    pub fn to_key(&self) -> String {
        format!("{STAGING_PREFIX}{}", self.0.simple())
    }

    /// Returns `true` if `key` was produced by [`StagingKey::to_key`].
    pub fn is_staging_key(key: &str) -> bool {
        key.strip_prefix(STAGING_PREFIX)
            .and_then(|rest| uuid::Uuid::try_parse(rest).ok())
            .is_some()
    }
}

impl Default for StagingKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StagingKey({})", self.0.simple())
    }
}

impl fmt::Display for StagingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_unique() {
        let a = StagingKey::new();
        let b = StagingKey::new();
        assert_ne!(a, b);
        assert_ne!(a.to_key(), b.to_key());
    }

    #[test]
    fn key_is_ascii_and_prefixed() {
        let key = StagingKey::new().to_key();
        assert!(key.starts_with(STAGING_PREFIX));
        assert!(key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-'));
    }

    #[test]
    fn recognizes_own_keys() {
        let key = StagingKey::new().to_key();
        assert!(StagingKey::is_staging_key(&key));
        assert!(!StagingKey::is_staging_key("deadbeef"));
        assert!(!StagingKey::is_staging_key("staging-nope"));
    }
}
