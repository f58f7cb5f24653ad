use std::io::{self, Read};

use arca_types::content_id::SHORT_ID_LEN;
use arca_types::{Checksum, ContentId};
use tracing::warn;

use crate::digest::{Digest, StreamDigest};

/// Domain tag mixed into every archive content identifier.
pub const ARCHIVE_DOMAIN: &str = "arca.v1 content-id";

/// Domain-separated content hasher.
///
/// The short identifier is computed with BLAKE3 in key-derivation mode, using
/// the domain tag as the context string, and truncated to 4 bytes. The same
/// bytes hashed by another application with another context produce an
/// unrelated identifier.
///
/// The checksum is plain 32-byte BLAKE3 and does not depend on the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Hasher used for archive content identifiers.
    pub const ARCHIVE: Self = Self {
        domain: ARCHIVE_DOMAIN,
    };

    /// Create a hasher with a custom domain tag.
    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// The domain tag used by this hasher.
    pub fn domain(&self) -> &str {
        self.domain
    }

    /// Build the keyed short-id hasher for this domain.
    ///
    /// Fails only for a blank domain tag, which never happens with
    /// [`ContentHasher::ARCHIVE`].
    pub(crate) fn short_hasher(&self) -> Result<blake3::Hasher, HasherError> {
        if self.domain.trim().is_empty() {
            return Err(HasherError::Configuration(
                "domain tag must not be blank".into(),
            ));
        }
        Ok(blake3::Hasher::new_derive_key(self.domain))
    }

    /// Short content identifier over an in-memory buffer.
    pub fn short_id(&self, data: &[u8]) -> Result<ContentId, HasherError> {
        let mut hasher = self.short_hasher()?;
        hasher.update(data);
        Ok(finalize_short(&hasher))
    }

    /// Short content identifier over a stream, consuming it once.
    pub fn short_id_reader<R: Read>(&self, mut reader: R) -> Result<ContentId, HasherError> {
        let mut hasher = self.short_hasher()?;
        io::copy(&mut reader, &mut hasher)?;
        Ok(finalize_short(&hasher))
    }

    /// 32-byte verification checksum over an in-memory buffer.
    pub fn checksum(data: &[u8]) -> Checksum {
        Checksum::from_hash(*blake3::hash(data).as_bytes())
    }

    /// 32-byte verification checksum over a stream, consuming it once.
    pub fn checksum_reader<R: Read>(mut reader: R) -> io::Result<Checksum> {
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut reader, &mut hasher)?;
        Ok(Checksum::from_hash(*hasher.finalize().as_bytes()))
    }

    /// Check that `data` hashes to `expected`.
    pub fn verify(data: &[u8], expected: &Checksum) -> bool {
        Self::checksum(data) == *expected
    }

    /// Start an incremental digest (identifier, checksum and size).
    ///
    /// If the short-id hasher cannot be built, the digest falls back to the
    /// checksum as identifier. The fallback is decided here, once, so buffered
    /// and streaming digests always agree.
    pub fn stream_digest(&self) -> StreamDigest {
        let short = match self.short_hasher() {
            Ok(hasher) => Some(hasher),
            Err(e) => {
                warn!(domain = self.domain, error = %e, "short id unavailable; using checksum as id");
                None
            }
        };
        StreamDigest::new(short)
    }

    /// Full digest of an in-memory buffer.
    pub fn digest(&self, data: &[u8]) -> Digest {
        let mut digest = self.stream_digest();
        digest.update(data);
        digest.finalize()
    }

    /// Full digest of a stream, consuming it once.
    pub fn digest_reader<R: Read>(&self, mut reader: R) -> io::Result<Digest> {
        let mut digest = self.stream_digest();
        io::copy(&mut reader, &mut digest)?;
        Ok(digest.finalize())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::ARCHIVE
    }
}

/// Truncate a keyed hasher's output to the short identifier length.
pub(crate) fn finalize_short(hasher: &blake3::Hasher) -> ContentId {
    let mut out = [0u8; SHORT_ID_LEN];
    hasher.finalize_xof().fill(&mut out);
    ContentId::from_short_hash(out)
}

/// Errors from hashing operations.
#[derive(Debug, thiserror::Error)]
pub enum HasherError {
    /// The hasher rejected its configuration.
    #[error("hash configuration error: {0}")]
    Configuration(String),

    /// Reading the source stream failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}
