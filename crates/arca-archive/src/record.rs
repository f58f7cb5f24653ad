//! The per-file metadata record and its persisted form.
//!
//! A record is stored in the metadata store as a flat JSON object:
//!
//! ```json
//! {"id":"1f0c9a2b","filenames":["report.txt"],"size":5120,
//!  "checksum":"9c1e…","custom":null}
//! ```

use arca_crypto::Digest;
use arca_types::{Checksum, ContentId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, ArchiveResult};

/// Descriptive record for one stored content object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Content identifier; equals the key in both stores.
    pub id: ContentId,
    /// Display names, oldest first. The first one is the canonical name.
    pub filenames: Vec<String>,
    /// Content length in bytes at ingestion time.
    pub size: u64,
    /// Verification checksum of the full content.
    pub checksum: Checksum,
    /// Opaque caller-defined attachment.
    #[serde(default)]
    pub custom: Option<CustomData>,
}

impl MetadataRecord {
    /// Fresh record for newly ingested content.
    pub fn new(digest: &Digest, display_name: &str) -> Self {
        Self {
            id: digest.id.clone(),
            filenames: vec![base_name(display_name).to_string()],
            size: digest.size,
            checksum: digest.checksum,
            custom: None,
        }
    }

    /// The canonical display name, if any.
    pub fn canonical_name(&self) -> Option<&str> {
        self.filenames.first().map(String::as_str)
    }

    /// Serialize for the metadata store.
    pub fn encode(&self) -> ArchiveResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    /// Deserialize bytes read from the metadata store under `key`.
    ///
    /// Fails with [`ArchiveError::Decode`] if the bytes are not a record or
    /// if the record's `id` differs from the key it was stored under.
    pub fn decode(key: &str, bytes: &[u8]) -> ArchiveResult<Self> {
        let record: Self = serde_json::from_slice(bytes).map_err(|e| ArchiveError::Decode {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if record.id.as_str() != key {
            return Err(ArchiveError::Decode {
                key: key.to_string(),
                reason: format!("record id {} does not match its key", record.id),
            });
        }
        Ok(record)
    }
}

/// Last non-empty segment of a display name, splitting on `/` and `\`.
///
/// An empty name becomes `"."` and a name made only of separators becomes
/// `"/"`, so the result never contains a separator.
pub fn base_name(name: &str) -> &str {
    if name.is_empty() {
        return ".";
    }
    name.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or("/")
}

/// Opaque attachment stored alongside a record.
///
/// The archive never interprets these bytes; the schema belongs to the
/// caller. Persisted as a lower-case hex string.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CustomData(Vec<u8>);

impl CustomData {
    /// Wrap raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Encode a caller value as JSON.
    pub fn from_json<T: Serialize>(value: &T) -> ArchiveResult<Self> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| ArchiveError::Encode(e.to_string()))
    }

    /// Decode the bytes as JSON into a caller type.
    pub fn to_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Take the raw bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl std::fmt::Debug for CustomData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CustomData({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for CustomData {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for CustomData {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl TryFrom<String> for CustomData {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        hex::decode(s).map(Self)
    }
}

impl From<CustomData> for String {
    fn from(data: CustomData) -> Self {
        hex::encode(data.0)
    }
}
