use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::error::{StoreError, StoreResult};
use crate::keys::validate_key;
use crate::traits::{KeyIter, KvStore};

struct Entry {
    data: Vec<u8>,
    modified: SystemTime,
}

impl Entry {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            modified: SystemTime::now(),
        }
    }
}

/// In-memory, `BTreeMap`-based key-value store.
///
/// Intended for tests and embedding. All values are held in memory behind a
/// `RwLock` for safe concurrent access. Values are cloned on read; streaming
/// reads hand out a cursor over a copy.
pub struct InMemoryKv {
    entries: RwLock<BTreeMap<String, Entry>>,
}

impl InMemoryKv {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_lock(&self) -> StoreResult<RwLockReadGuard<'_, BTreeMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write_lock(&self) -> StoreResult<RwLockWriteGuard<'_, BTreeMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for InMemoryKv {
    fn write(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.write_lock()?
            .insert(key.to_string(), Entry::new(data.to_vec()));
        Ok(())
    }

    fn read(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.read_lock()?
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn erase(&self, key: &str) -> StoreResult<()> {
        self.write_lock()?.remove(key);
        Ok(())
    }

    fn write_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<u64> {
        validate_key(key)?;
        // Drain outside the lock so a slow source never blocks other keys.
        let mut data = Vec::new();
        let n = reader.read_to_end(&mut data)?;
        self.write_lock()?.insert(key.to_string(), Entry::new(data));
        Ok(n as u64)
    }

    fn read_stream(&self, key: &str) -> StoreResult<Box<dyn Read + Send>> {
        let data = self.read(key)?;
        Ok(Box::new(Cursor::new(data)))
    }

    fn keys(&self) -> KeyIter<'_> {
        match self.read_lock() {
            Ok(map) => {
                let snapshot: Vec<String> = map.keys().cloned().collect();
                Box::new(snapshot.into_iter().map(Ok))
            }
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read_lock()?.contains_key(key))
    }

    fn touch(&self, key: &str) -> StoreResult<()> {
        let mut map = self.write_lock()?;
        let entry = map
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        entry.modified = SystemTime::now();
        Ok(())
    }

    fn modified(&self, key: &str) -> StoreResult<SystemTime> {
        self.read_lock()?
            .get(key)
            .map(|e| e.modified)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        validate_key(to)?;
        let mut map = self.write_lock()?;
        let entry = map
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        map.insert(to.to_string(), entry);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKv")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Core CRUD
    // -----------------------------------------------------------------------

    #[test]
    fn write_and_read() {
        let store = InMemoryKv::new();
        store.write("k1", b"Test Data").unwrap();
        assert_eq!(store.read("k1").unwrap(), b"Test Data");
    }

    #[test]
    fn overwrite_replaces_value() {
        let store = InMemoryKv::new();
        store.write("k1", b"Test Data").unwrap();
        store.write("k1", b"Data Test").unwrap();
        assert_eq!(store.read("k1").unwrap(), b"Data Test");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn read_missing_is_not_found() {
        let store = InMemoryKv::new();
        let err = store.read("missing").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn erase_is_idempotent() {
        let store = InMemoryKv::new();
        store.write("gone", b"x").unwrap();
        store.erase("gone").unwrap();
        store.erase("gone").unwrap();
        assert!(!store.contains("gone").unwrap());
    }

    #[test]
    fn invalid_key_is_rejected() {
        let store = InMemoryKv::new();
        let err = store.write("a/b", b"x").unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey { .. }));
    }

    // -----------------------------------------------------------------------
    // Streaming
    // -----------------------------------------------------------------------

    #[test]
    fn stream_roundtrip() {
        let store = InMemoryKv::new();
        let mut src = Cursor::new(b"streamed bytes".to_vec());
        let n = store.write_stream("s", &mut src).unwrap();
        assert_eq!(n, 14);

        let mut out = String::new();
        store
            .read_stream("s")
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "streamed bytes");
    }

    #[test]
    fn read_stream_missing_is_not_found() {
        let store = InMemoryKv::new();
        assert!(store.read_stream("nope").err().unwrap().is_not_found());
    }

    // -----------------------------------------------------------------------
    // Keys
    // -----------------------------------------------------------------------

    #[test]
    fn keys_enumerates_everything() {
        let store = InMemoryKv::new();
        store.write("b", b"2").unwrap();
        store.write("a", b"1").unwrap();
        let keys: Vec<String> = store.keys().collect::<StoreResult<_>>().unwrap();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn keys_is_restartable() {
        let store = InMemoryKv::new();
        store.write("a", b"1").unwrap();
        assert_eq!(store.keys().count(), 1);
        assert_eq!(store.keys().count(), 1);
    }

    #[test]
    fn keys_with_prefix_filters() {
        let store = InMemoryKv::new();
        store.write("ab01", b"1").unwrap();
        store.write("ab02", b"2").unwrap();
        store.write("cd01", b"3").unwrap();
        let keys: Vec<String> = store
            .keys_with_prefix("ab")
            .collect::<StoreResult<_>>()
            .unwrap();
        assert_eq!(keys.len(), 2);
    }

    // -----------------------------------------------------------------------
    // Rename / touch
    // -----------------------------------------------------------------------

    #[test]
    fn rename_moves_value() {
        let store = InMemoryKv::new();
        store.write("from", b"payload").unwrap();
        store.rename("from", "to").unwrap();
        assert!(!store.contains("from").unwrap());
        assert_eq!(store.read("to").unwrap(), b"payload");
    }

    #[test]
    fn rename_missing_source_fails() {
        let store = InMemoryKv::new();
        assert!(store.rename("nope", "to").unwrap_err().is_not_found());
    }

    #[test]
    fn touch_updates_modified_only() {
        let store = InMemoryKv::new();
        store.write("t", b"same").unwrap();
        let before = store.modified("t").unwrap();
        store.touch("t").unwrap();
        assert!(store.modified("t").unwrap() >= before);
        assert_eq!(store.read("t").unwrap(), b"same");
    }

    #[test]
    fn touch_missing_is_not_found() {
        let store = InMemoryKv::new();
        assert!(store.touch("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn len_tracks_keys() {
        let store = InMemoryKv::new();
        assert!(store.is_empty());
        store.write("a", b"1").unwrap();
        store.write("b", b"2").unwrap();
        assert_eq!(store.len(), 2);
        store.erase("a").unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_writes_on_distinct_keys() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(InMemoryKv::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    let key = format!("key-{i}");
                    store.write(&key, key.as_bytes()).unwrap();
                    assert_eq!(store.read(&key).unwrap(), key.as_bytes());
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread should not panic");
        }
        assert_eq!(store.len(), 8);
    }

    #[test]
    fn debug_format() {
        let store = InMemoryKv::new();
        store.write("x", b"x").unwrap();
        let debug = format!("{store:?}");
        assert!(debug.contains("InMemoryKv"));
        assert!(debug.contains("key_count"));
    }
}
