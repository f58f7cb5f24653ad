use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::checksum::{Checksum, CHECKSUM_LEN};
use crate::error::TypeError;

/// Length of a short content identifier in bytes.
pub const SHORT_ID_LEN: usize = 4;

/// Content-addressed identifier for a stored file.
///
/// A `ContentId` is the hex encoding of a short keyed hash over the file's
/// bytes: 8 lower-case hex characters. Identical content always produces the
/// same `ContentId`, so it doubles as the key in both the blob store and the
/// metadata store.
///
/// When the short hash cannot be computed the identifier falls back to the
/// full 64-character checksum, so both lengths are accepted on parse.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Create a `ContentId` from a finalized short hash.
    pub fn from_short_hash(hash: [u8; SHORT_ID_LEN]) -> Self {
        Self(hex::encode(hash))
    }

    /// Fallback identifier: the full checksum in hex.
    pub fn from_checksum(checksum: &Checksum) -> Self {
        Self(checksum.to_hex())
    }

    /// Parse and validate an identifier string.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(TypeError::NotLowercase(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != SHORT_ID_LEN && bytes.len() != CHECKSUM_LEN {
            return Err(TypeError::InvalidLength {
                expected: SHORT_ID_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self(s.to_string()))
    }

    /// The identifier as a backend key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for a regular 8-character identifier, `false` for a
    /// checksum-derived fallback identifier.
    pub fn is_short(&self) -> bool {
        self.0.len() == SHORT_ID_LEN * 2
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}
