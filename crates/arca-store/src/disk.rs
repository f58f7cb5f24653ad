//! File-per-key store on the local filesystem.
//!
//! Layout for the default configuration (shard width 2, depth 2):
//!
//! ```text
//! <root>/
//!   .tmp/                 in-flight writes, same filesystem as the data
//!   de/
//!     ad/
//!       deadbeef          value stored under key "deadbeef"
//! ```
//!
//! Every write goes to a temp file under `.tmp/` and is then renamed into
//! place, so a reader sees either the previous value or the complete new one.

use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{StoreError, StoreResult};
use crate::keys::validate_key;
use crate::traits::{KeyIter, KvStore};

/// Directory holding in-flight writes.
const TMP_DIR: &str = ".tmp";

/// Configuration for a [`DiskKv`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskKvConfig {
    /// Characters of the key per shard directory level.
    pub shard_width: usize,
    /// Number of shard directory levels.
    pub shard_depth: usize,
    /// `fsync` each value before it is renamed into place.
    pub sync_writes: bool,
}

impl Default for DiskKvConfig {
    fn default() -> Self {
        Self {
            shard_width: 2,
            shard_depth: 2,
            sync_writes: false,
        }
    }
}

/// Key-value store keeping one file per key under a sharded directory tree.
#[derive(Debug)]
pub struct DiskKv {
    root: PathBuf,
    tmp_dir: PathBuf,
    config: DiskKvConfig,
}

impl DiskKv {
    /// Open (or create) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>, config: DiskKvConfig) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        let tmp_dir = root.join(TMP_DIR);
        fs::create_dir_all(&tmp_dir)?;
        debug!(root = %root.display(), ?config, "disk store opened");
        Ok(Self {
            root,
            tmp_dir,
            config,
        })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The store configuration.
    pub fn config(&self) -> &DiskKvConfig {
        &self.config
    }

    /// File path holding the value for `key`.
    ///
    /// The first `shard_depth` blocks of `shard_width` characters become
    /// directory levels. Blocks past the end of a short key are padded with
    /// `_`, so every value file sits at the same depth and never shares a
    /// name with a shard directory.
    pub fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.clone();
        let width = self.config.shard_width;
        if width > 0 {
            for level in 0..self.config.shard_depth {
                let start = (level * width).min(key.len());
                let end = ((level + 1) * width).min(key.len());
                let mut block = key[start..end].to_string();
                while block.len() < width {
                    block.push('_');
                }
                path.push(block);
            }
        }
        path.push(key);
        Ok(path)
    }

    /// Write a value through a temp file and rename it into place.
    fn persist_with<F>(&self, path: &Path, fill: F) -> StoreResult<u64>
    where
        F: FnOnce(&mut File) -> io::Result<u64>,
    {
        let mut tmp = NamedTempFile::new_in(&self.tmp_dir)?;
        let written = fill(tmp.as_file_mut())?;
        if self.config.sync_writes {
            tmp.as_file().sync_all()?;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        Ok(written)
    }
}

/// Map `io::ErrorKind::NotFound` to [`StoreError::NotFound`].
fn classify(key: &str, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(key.to_string())
    } else {
        StoreError::Io(err)
    }
}

impl KvStore for DiskKv {
    fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key)?;
        self.persist_with(&path, |file| {
            file.write_all(data)?;
            Ok(data.len() as u64)
        })?;
        debug!(key, len = data.len(), "disk write");
        Ok(())
    }

    fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| classify(key, e))
    }

    fn erase(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(key, "disk erase");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<u64> {
        let path = self.path_for(key)?;
        let written = self.persist_with(&path, |file| {
            let mut writer = BufWriter::new(file);
            let n = io::copy(reader, &mut writer)?;
            writer.flush()?;
            Ok(n)
        })?;
        debug!(key, len = written, "disk stream write");
        Ok(written)
    }

    fn read_stream(&self, key: &str) -> StoreResult<Box<dyn Read + Send>> {
        let path = self.path_for(key)?;
        let file = File::open(&path).map_err(|e| classify(key, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn keys(&self) -> KeyIter<'_> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == TMP_DIR));
        Box::new(walker.filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => {
                let name = entry.file_name().to_str()?;
                validate_key(name).ok()?;
                Some(Ok(name.to_string()))
            }
            Ok(_) => None,
            Err(e) => Some(Err(StoreError::Walk(e))),
        }))
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        let path = self.path_for(key)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn touch(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let file = OpenOptions::new()
            .write(true)
            .open(&path)
            .map_err(|e| classify(key, e))?;
        let now = SystemTime::now();
        file.set_times(FileTimes::new().set_accessed(now).set_modified(now))?;
        debug!(key, "disk touch");
        Ok(())
    }

    fn modified(&self, key: &str) -> StoreResult<SystemTime> {
        let path = self.path_for(key)?;
        let meta = fs::metadata(&path).map_err(|e| classify(key, e))?;
        Ok(meta.modified()?)
    }

    fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        let from_path = self.path_for(from)?;
        let to_path = self.path_for(to)?;
        if let Some(parent) = to_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&from_path, &to_path).map_err(|e| classify(from, e))?;
        debug!(from, to, "disk rename");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    fn temp_store() -> (tempfile::TempDir, DiskKv) {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskKv::open(dir.path().join("kv"), DiskKvConfig::default()).unwrap();
        (dir, store)
    }

    #[test]
    fn write_and_read() {
        let (_dir, store) = temp_store();
        store.write("deadbeef", b"Test Data").unwrap();
        assert_eq!(store.read("deadbeef").unwrap(), b"Test Data");
    }

    #[test]
    fn overwrite_replaces_value() {
        let (_dir, store) = temp_store();
        store.write("deadbeef", b"Test Data").unwrap();
        store.write("deadbeef", b"Data Test").unwrap();
        assert_eq!(store.read("deadbeef").unwrap(), b"Data Test");
    }

    #[test]
    fn value_lands_in_shard_directories() {
        let (_dir, store) = temp_store();
        store.write("deadbeef", b"x").unwrap();
        let expected = store.root().join("de").join("ad").join("deadbeef");
        assert_eq!(store.path_for("deadbeef").unwrap(), expected);
        assert!(expected.is_file());
    }

    #[test]
    fn short_keys_are_padded() {
        let (_dir, store) = temp_store();
        assert_eq!(
            store.path_for("abc").unwrap(),
            store.root().join("ab").join("c_").join("abc")
        );
        assert_eq!(
            store.path_for("ab").unwrap(),
            store.root().join("ab").join("__").join("ab")
        );
    }

    #[test]
    fn short_and_long_keys_coexist() {
        let (_dir, store) = temp_store();
        store.write("ab", b"short").unwrap();
        store.write("abab0001", b"long").unwrap();
        store.write("abc", b"mid").unwrap();
        assert_eq!(store.read("ab").unwrap(), b"short");
        assert_eq!(store.read("abab0001").unwrap(), b"long");
        assert_eq!(store.read("abc").unwrap(), b"mid");
        assert_eq!(store.keys().count(), 3);
    }

    #[test]
    fn unsharded_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskKvConfig {
            shard_depth: 0,
            ..DiskKvConfig::default()
        };
        let store = DiskKv::open(dir.path(), config).unwrap();
        assert_eq!(
            store.path_for("deadbeef").unwrap(),
            dir.path().join("deadbeef")
        );
    }

    #[test]
    fn read_missing_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(store.read("deadbeef").unwrap_err().is_not_found());
        assert!(store.read_stream("deadbeef").err().unwrap().is_not_found());
        assert!(store.modified("deadbeef").unwrap_err().is_not_found());
    }

    #[test]
    fn erase_is_idempotent() {
        let (_dir, store) = temp_store();
        store.write("deadbeef", b"x").unwrap();
        store.erase("deadbeef").unwrap();
        store.erase("deadbeef").unwrap();
        assert!(!store.contains("deadbeef").unwrap());
    }

    #[test]
    fn invalid_key_never_touches_disk() {
        let (_dir, store) = temp_store();
        let err = store.write("../escape", b"x").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    #[test]
    fn stream_roundtrip_large_value() {
        let (_dir, store) = temp_store();
        let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 253) as u8).collect();
        let n = store
            .write_stream("cafebabe", &mut Cursor::new(data.clone()))
            .unwrap();
        assert_eq!(n, data.len() as u64);

        let mut out = Vec::new();
        store
            .read_stream("cafebabe")
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn keys_skip_tmp_dir() {
        let (_dir, store) = temp_store();
        store.write("aaaa0001", b"1").unwrap();
        store.write("bbbb0002", b"2").unwrap();
        fs::write(store.tmp_dir.join("leftover"), b"junk").unwrap();

        let mut keys: Vec<String> = store.keys().collect::<StoreResult<_>>().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["aaaa0001".to_string(), "bbbb0002".to_string()]);
    }

    #[test]
    fn keys_with_prefix_filters() {
        let (_dir, store) = temp_store();
        store.write("aaaa0001", b"1").unwrap();
        store.write("aaaa0002", b"2").unwrap();
        store.write("bbbb0003", b"3").unwrap();
        let keys: Vec<String> = store
            .keys_with_prefix("aaaa")
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn rename_moves_between_shards() {
        let (_dir, store) = temp_store();
        store.write("staging-0001", b"payload").unwrap();
        store.rename("staging-0001", "deadbeef").unwrap();
        assert!(!store.contains("staging-0001").unwrap());
        assert_eq!(store.read("deadbeef").unwrap(), b"payload");
    }

    #[test]
    fn rename_missing_source_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(store.rename("staging-0001", "deadbeef").unwrap_err().is_not_found());
    }

    #[test]
    fn touch_sets_modified_time() {
        let (_dir, store) = temp_store();
        store.write("deadbeef", b"same").unwrap();

        // Backdate the file so the touch is observable on coarse clocks.
        let old = SystemTime::now() - Duration::from_secs(3600);
        let file = OpenOptions::new()
            .write(true)
            .open(store.path_for("deadbeef").unwrap())
            .unwrap();
        file.set_modified(old).unwrap();
        drop(file);
        assert!(store.modified("deadbeef").unwrap() < SystemTime::now() - Duration::from_secs(60));

        store.touch("deadbeef").unwrap();
        assert!(store.modified("deadbeef").unwrap() > old + Duration::from_secs(60));
        assert_eq!(store.read("deadbeef").unwrap(), b"same");
    }

    #[test]
    fn touch_missing_is_not_found() {
        let (_dir, store) = temp_store();
        assert!(store.touch("deadbeef").unwrap_err().is_not_found());
    }

    #[test]
    fn sync_writes_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = DiskKvConfig {
            sync_writes: true,
            ..DiskKvConfig::default()
        };
        let store = DiskKv::open(dir.path(), config).unwrap();
        store.write("deadbeef", b"durable").unwrap();
        assert_eq!(store.read("deadbeef").unwrap(), b"durable");
    }

    #[test]
    fn reopen_sees_existing_values() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DiskKv::open(dir.path(), DiskKvConfig::default()).unwrap();
            store.write("deadbeef", b"persisted").unwrap();
        }
        let store = DiskKv::open(dir.path(), DiskKvConfig::default()).unwrap();
        assert_eq!(store.read("deadbeef").unwrap(), b"persisted");
        assert_eq!(store.keys().count(), 1);
    }
}
