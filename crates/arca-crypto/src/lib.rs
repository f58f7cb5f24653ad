//! Content hashing for the Arca archive.
//!
//! Two hashes with two jobs:
//!
//! - a 4-byte, domain-separated BLAKE3 hash that becomes the [`ContentId`]
//!   used as the storage key, and
//! - a 32-byte BLAKE3 hash that becomes the [`Checksum`] used for integrity
//!   verification.
//!
//! Both are available over in-memory buffers and over streams. The streaming
//! forms ([`StreamDigest`], [`HashingReader`]) feed every byte to both hashers
//! and a byte counter in one pass, and produce exactly what the buffered forms
//! produce for the same content.
//!
//! All crypto operations wrap the `blake3` crate; there is no custom cryptography.
//!
//! The id and checksum formats are BLAKE3-only. Archives written by tools that
//! key content with BLAKE2s (including older `scusi.v1`-tagged stores) produce
//! different ids and checksums for the same bytes and cannot be opened as-is.
//!
//! [`ContentId`]: arca_types::ContentId
//! [`Checksum`]: arca_types::Checksum

pub mod digest;
pub mod hasher;

pub use digest::{Digest, HashingReader, StreamDigest};
pub use hasher::{ContentHasher, HasherError, ARCHIVE_DOMAIN};
