use std::io::{self, Read, Write};

use arca_types::{Checksum, ContentId};

use crate::hasher::finalize_short;

/// Everything the archive derives from a file's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Digest {
    /// Storage key (short id, or checksum on fallback).
    pub id: ContentId,
    /// 32-byte verification checksum.
    pub checksum: Checksum,
    /// Number of bytes hashed.
    pub size: u64,
}

/// Incremental digest over a byte sequence.
///
/// Each call to [`update`](StreamDigest::update) feeds the same bytes to the
/// short-id hasher, the checksum hasher and the byte counter, in that order.
/// Created by [`ContentHasher::stream_digest`](crate::ContentHasher::stream_digest).
pub struct StreamDigest {
    short: Option<blake3::Hasher>,
    long: blake3::Hasher,
    size: u64,
}

impl StreamDigest {
    pub(crate) fn new(short: Option<blake3::Hasher>) -> Self {
        Self {
            short,
            long: blake3::Hasher::new(),
            size: 0,
        }
    }

    /// Feed a chunk of content.
    pub fn update(&mut self, data: &[u8]) {
        if let Some(short) = self.short.as_mut() {
            short.update(data);
        }
        self.long.update(data);
        self.size += data.len() as u64;
    }

    /// Bytes fed so far.
    pub fn bytes_seen(&self) -> u64 {
        self.size
    }

    /// Finalize both hashes and the count.
    pub fn finalize(self) -> Digest {
        let checksum = Checksum::from_hash(*self.long.finalize().as_bytes());
        let id = match &self.short {
            Some(short) => finalize_short(short),
            None => ContentId::from_checksum(&checksum),
        };
        Digest {
            id,
            checksum,
            size: self.size,
        }
    }
}

impl Write for StreamDigest {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for StreamDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDigest")
            .field("short_id", &self.short.is_some())
            .field("size", &self.size)
            .finish()
    }
}

/// A reader adapter that digests everything read through it.
///
/// Whoever drains the `HashingReader` (typically a backend stream write)
/// drives the hashing: each chunk is handed to the consumer and to the
/// digest in the same `read` call, so the source is read exactly once.
pub struct HashingReader<R> {
    inner: R,
    digest: StreamDigest,
}

impl<R: Read> HashingReader<R> {
    /// Wrap `inner`, feeding every byte read into `digest`.
    pub fn new(inner: R, digest: StreamDigest) -> Self {
        Self { inner, digest }
    }

    /// Bytes read through the adapter so far.
    pub fn bytes_read(&self) -> u64 {
        self.digest.bytes_seen()
    }

    /// Finalize the digest of everything read. Unread bytes are not included.
    pub fn finish(self) -> Digest {
        self.digest.finalize()
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.digest.update(&buf[..n]);
        Ok(n)
    }
}
