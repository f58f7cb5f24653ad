use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use arca_crypto::{ContentHasher, HashingReader};
use arca_store::{DiskKv, InMemoryKv, KvStore, StoreError};
use arca_types::{ContentId, StagingKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::ArchiveConfig;
use crate::error::{ArchiveError, ArchiveResult, StoreKind};
use crate::record::{base_name, CustomData, MetadataRecord};

/// A content-addressable file archive.
///
/// Content lives in the blob store and a [`MetadataRecord`] lives in the
/// metadata store, both under the same [`ContentId`]. The archive holds no
/// in-memory index; every operation goes straight to the two stores.
///
/// The stores are owned by the archive and never handed out, so bytes under
/// an id always hash to that id:
///
/// ```compile_fail
/// let archive = arca_archive::Archive::in_memory("sealed");
/// let _ = archive.blobs();
/// ```
pub struct Archive<S = DiskKv> {
    name: String,
    path: Option<PathBuf>,
    hasher: ContentHasher,
    blobs: S,
    meta: S,
}

impl Archive<DiskKv> {
    /// Open (or create) a disk archive at `path`, honouring `<path>/arca.toml`.
    pub fn open(path: impl AsRef<Path>) -> ArchiveResult<Self> {
        let path = path.as_ref();
        let config = ArchiveConfig::load(path)?;
        Self::open_with_config(path, config)
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: ArchiveConfig) -> ArchiveResult<Self> {
        config.validate()?;
        let path = path.as_ref().to_path_buf();
        let blobs = DiskKv::open(path.join(&config.blob_dir), config.blobs.clone())
            .map_err(|e| ArchiveError::write(StoreKind::Blob, e))?;
        let meta = DiskKv::open(path.join(&config.meta_dir), config.metadata.clone())
            .map_err(|e| ArchiveError::write(StoreKind::Metadata, e))?;
        let name = config.name.clone().unwrap_or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string())
        });
        debug!(%name, path = %path.display(), "archive opened");
        Ok(Self {
            name,
            path: Some(path),
            hasher: ContentHasher::ARCHIVE,
            blobs,
            meta,
        })
    }
}

impl Archive<InMemoryKv> {
    /// A volatile archive backed by two in-memory stores.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self::with_stores(name, InMemoryKv::new(), InMemoryKv::new())
    }
}

impl<S: KvStore> Archive<S> {
    /// Assemble an archive from caller-provided stores.
    pub fn with_stores(name: impl Into<String>, blobs: S, meta: S) -> Self {
        Self {
            name: name.into(),
            path: None,
            hasher: ContentHasher::ARCHIVE,
            blobs,
            meta,
        }
    }

    /// Replace the content hasher.
    ///
    /// An archive must be used with one hasher for its whole life; ids
    /// produced under different hashers are unrelated.
    pub fn with_hasher(mut self, hasher: ContentHasher) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root directory for disk archives, `None` otherwise.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    #[cfg(test)]
    pub(crate) fn blobs(&self) -> &S {
        &self.blobs
    }

    #[cfg(test)]
    pub(crate) fn metadata(&self) -> &S {
        &self.meta
    }

    /// The short identifier `data` would be stored under.
    ///
    /// Unlike ingestion this does not fall back to a checksum-derived id;
    /// a misconfigured hasher surfaces as [`ArchiveError::HashConfiguration`].
    pub fn identify(&self, data: &[u8]) -> ArchiveResult<ContentId> {
        Ok(self.hasher.short_id(data)?)
    }

    // ---- Ingestion ----

    /// Store an in-memory buffer under `display_name`.
    ///
    /// Identical content maps to the same id; re-adding it replaces the
    /// metadata record with a fresh one.
    pub fn add_file(&self, display_name: &str, data: &[u8]) -> ArchiveResult<ContentId> {
        let digest = self.hasher.digest(data);
        let record = MetadataRecord::new(&digest, display_name);

        self.put_record(&record)?;
        self.blobs
            .write(digest.id.as_str(), data)
            .map_err(|e| ArchiveError::write(StoreKind::Blob, e))?;

        debug!(id = %digest.id, size = digest.size, "file added");
        Ok(digest.id)
    }

    /// Store everything `source` yields under `display_name`.
    ///
    /// The source is read once. Bytes land under a provisional staging key
    /// while they are hashed; once the id is known the staged blob is either
    /// renamed to it or, if that content is already stored, discarded.
    pub fn write_stream<R: Read>(&self, display_name: &str, source: R) -> ArchiveResult<ContentId> {
        let staging = StagingKey::new().to_key();
        let mut reader = HashingReader::new(source, self.hasher.stream_digest());

        let stored = match self.blobs.write_stream(&staging, &mut reader) {
            Ok(n) => n,
            Err(e) => {
                self.discard_staged(&staging);
                return Err(ArchiveError::write(StoreKind::Blob, e));
            }
        };
        // The staged blob must be exactly the bytes that were hashed.
        let hashed = reader.bytes_read();
        if stored != hashed {
            self.discard_staged(&staging);
            return Err(ArchiveError::write(
                StoreKind::Blob,
                StoreError::Io(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("stored {stored} of {hashed} streamed bytes"),
                )),
            ));
        }
        let digest = reader.finish();

        if let Err(e) = self.commit_staged(&staging, &digest.id) {
            self.discard_staged(&staging);
            return Err(e);
        }

        let record = MetadataRecord::new(&digest, display_name);
        self.put_record(&record)?;

        debug!(id = %digest.id, size = digest.size, "stream added");
        Ok(digest.id)
    }

    fn commit_staged(&self, staging: &str, id: &ContentId) -> ArchiveResult<()> {
        let exists = self
            .blobs
            .contains(id.as_str())
            .map_err(|e| ArchiveError::read(StoreKind::Blob, e))?;
        if exists {
            debug!(%id, "content already stored, dropping staged copy");
            self.blobs
                .erase(staging)
                .map_err(|e| ArchiveError::write(StoreKind::Blob, e))
        } else {
            self.blobs
                .rename(staging, id.as_str())
                .map_err(|e| ArchiveError::write(StoreKind::Blob, e))
        }
    }

    /// Staging keys currently in the blob store.
    ///
    /// Outside an in-flight [`write_stream`](Self::write_stream) these are
    /// leftovers of interrupted ingestion.
    pub fn staging_keys(&self) -> ArchiveResult<Vec<String>> {
        let mut keys = Vec::new();
        for key in self.blobs.keys() {
            let key = key.map_err(|e| ArchiveError::read(StoreKind::Blob, e))?;
            if StagingKey::is_staging_key(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn discard_staged(&self, staging: &str) {
        if let Err(e) = self.blobs.erase(staging) {
            warn!(key = staging, error = %e, "failed to discard staged blob");
        }
    }

    // ---- Retrieval ----

    pub fn get_meta(&self, id: &ContentId) -> ArchiveResult<MetadataRecord> {
        let bytes = self
            .meta
            .read(id.as_str())
            .map_err(|e| ArchiveError::read_of(StoreKind::Metadata, id, e))?;
        MetadataRecord::decode(id.as_str(), &bytes)
    }

    /// Fetch the record and the full content.
    pub fn get_file(&self, id: &ContentId) -> ArchiveResult<(MetadataRecord, Vec<u8>)> {
        let data = self
            .blobs
            .read(id.as_str())
            .map_err(|e| ArchiveError::read_of(StoreKind::Blob, id, e))?;
        let record = self.get_meta(id)?;
        Ok((record, data))
    }

    /// Open a streaming reader over the content.
    pub fn get_file_reader(&self, id: &ContentId) -> ArchiveResult<Box<dyn Read + Send>> {
        self.blobs
            .read_stream(id.as_str())
            .map_err(|e| ArchiveError::read_of(StoreKind::Blob, id, e))
    }

    /// Re-hash the stored content and compare it with the record.
    pub fn verify_file(&self, id: &ContentId) -> ArchiveResult<bool> {
        let record = self.get_meta(id)?;
        let reader = self.get_file_reader(id)?;
        let digest = self
            .hasher
            .digest_reader(reader)
            .map_err(|e| ArchiveError::read(StoreKind::Blob, StoreError::Io(e)))?;
        let intact = digest.checksum == record.checksum && digest.size == record.size;
        if !intact {
            warn!(%id, "stored content does not match its record");
        }
        Ok(intact)
    }

    pub fn contains(&self, id: &ContentId) -> ArchiveResult<bool> {
        self.meta
            .contains(id.as_str())
            .map_err(|e| ArchiveError::read(StoreKind::Metadata, e))
    }

    // ---- Mutation ----

    /// Remove both the content and its record.
    ///
    /// Removing an absent id succeeds. Both erases are attempted even if the
    /// first fails; the first failure is returned.
    pub fn remove_file(&self, id: &ContentId) -> ArchiveResult<()> {
        let blob = self
            .blobs
            .erase(id.as_str())
            .map_err(|e| ArchiveError::write(StoreKind::Blob, e));
        let meta = self
            .meta
            .erase(id.as_str())
            .map_err(|e| ArchiveError::write(StoreKind::Metadata, e));
        if let Err(e) = &blob {
            warn!(%id, error = %e, "blob erase failed");
        }
        debug!(%id, "file removed");
        blob.and(meta)
    }

    /// Refresh the storage-level modification time of the record.
    pub fn touch(&self, id: &ContentId) -> ArchiveResult<()> {
        self.meta
            .touch(id.as_str())
            .map_err(|e| ArchiveError::write_of(StoreKind::Metadata, id, e))
    }

    pub fn last_touched(&self, id: &ContentId) -> ArchiveResult<SystemTime> {
        self.meta
            .modified(id.as_str())
            .map_err(|e| ArchiveError::read_of(StoreKind::Metadata, id, e))
    }

    /// Replace the custom attachment, leaving the rest of the record as is.
    pub fn set_custom(&self, id: &ContentId, custom: CustomData) -> ArchiveResult<()> {
        self.update_record(id, |record| record.custom = Some(custom))
    }

    pub fn clear_custom(&self, id: &ContentId) -> ArchiveResult<()> {
        self.update_record(id, |record| record.custom = None)
    }

    pub fn get_custom(&self, id: &ContentId) -> ArchiveResult<Option<CustomData>> {
        Ok(self.get_meta(id)?.custom)
    }

    /// [`set_custom`](Self::set_custom) with a JSON-encoded caller value.
    pub fn set_custom_json<T: Serialize>(&self, id: &ContentId, value: &T) -> ArchiveResult<()> {
        self.set_custom(id, CustomData::from_json(value)?)
    }

    /// Decode the custom attachment as JSON. `None` if there is none.
    pub fn get_custom_json<T: DeserializeOwned>(&self, id: &ContentId) -> ArchiveResult<Option<T>> {
        match self.get_custom(id)? {
            Some(data) => data
                .to_json()
                .map(Some)
                .map_err(|e| ArchiveError::Decode {
                    key: id.to_string(),
                    reason: format!("custom data is not the requested JSON: {e}"),
                }),
            None => Ok(None),
        }
    }

    /// Append a display name for existing content.
    ///
    /// `filenames` is append-only and keeps repeated names.
    pub fn add_filename(&self, id: &ContentId, display_name: &str) -> ArchiveResult<()> {
        let name = base_name(display_name).to_string();
        self.update_record(id, |record| record.filenames.push(name))
    }

    fn update_record<F>(&self, id: &ContentId, change: F) -> ArchiveResult<()>
    where
        F: FnOnce(&mut MetadataRecord),
    {
        let mut record = self.get_meta(id)?;
        change(&mut record);
        self.put_record(&record)
    }

    fn put_record(&self, record: &MetadataRecord) -> ArchiveResult<()> {
        self.meta
            .write(record.id.as_str(), &record.encode()?)
            .map_err(|e| ArchiveError::write(StoreKind::Metadata, e))
    }

    // ---- Enumeration ----

    /// Every metadata record, in store order.
    ///
    /// Fails on the first unreadable or undecodable record.
    pub fn list(&self) -> ArchiveResult<Vec<MetadataRecord>> {
        self.list_prefix("")
    }

    /// Records whose id starts with `prefix`.
    pub fn list_prefix(&self, prefix: &str) -> ArchiveResult<Vec<MetadataRecord>> {
        let mut records = Vec::new();
        for key in self.meta.keys_with_prefix(prefix) {
            let key = key.map_err(|e| ArchiveError::read(StoreKind::Metadata, e))?;
            let bytes = self
                .meta
                .read(&key)
                .map_err(|e| ArchiveError::read(StoreKind::Metadata, e))?;
            records.push(MetadataRecord::decode(&key, &bytes)?);
        }
        Ok(records)
    }
}

impl<S> std::fmt::Debug for Archive<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("hasher", &self.hasher)
            .finish()
    }
}
