use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Length of a verification checksum in bytes.
pub const CHECKSUM_LEN: usize = 32;

/// Verification checksum over a file's full content.
///
/// A `Checksum` is never used as a storage key (except by the identifier
/// fallback, see [`ContentId::from_checksum`](crate::ContentId::from_checksum)).
/// It serializes as a 64-character lower-case hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Checksum([u8; CHECKSUM_LEN]);

impl Checksum {
    /// Create a `Checksum` from a pre-computed digest.
    pub fn from_hash(hash: [u8; CHECKSUM_LEN]) -> Self {
        Self(hash)
    }

    /// The raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; CHECKSUM_LEN] {
        &self.0
    }

    /// Hex-encoded string representation (64 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 64-character lower-case hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        if s.bytes().any(|b| b.is_ascii_uppercase()) {
            return Err(TypeError::NotLowercase(s.to_string()));
        }
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        let arr: [u8; CHECKSUM_LEN] =
            bytes
                .try_into()
                .map_err(|bytes: Vec<u8>| TypeError::InvalidLength {
                    expected: CHECKSUM_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl From<[u8; CHECKSUM_LEN]> for Checksum {
    fn from(bytes: [u8; CHECKSUM_LEN]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<String> for Checksum {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_hex(&s)
    }
}

impl From<Checksum> for String {
    fn from(checksum: Checksum) -> Self {
        checksum.to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_is_64_lowercase_chars() {
        let c = Checksum::from_hash([0xAB; 32]);
        let hex = c.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.chars().all(|ch| matches!(ch, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn hex_roundtrip() {
        let c = Checksum::from_hash([7; 32]);
        assert_eq!(Checksum::from_hex(&c.to_hex()).unwrap(), c);
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Checksum::from_hex("abcd").unwrap_err();
        assert_eq!(
            err,
            TypeError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
    }

    #[test]
    fn rejects_uppercase() {
        let upper = "AB".repeat(32);
        assert!(matches!(
            Checksum::from_hex(&upper),
            Err(TypeError::NotLowercase(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let c = Checksum::from_hash([1; 32]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let parsed: Checksum = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, c);
    }
}
