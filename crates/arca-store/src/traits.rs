use std::io::Read;
use std::time::SystemTime;

use crate::error::StoreResult;

/// Lazy key enumeration. Dropping the iterator ends the enumeration.
pub type KeyIter<'a> = Box<dyn Iterator<Item = StoreResult<String>> + 'a>;

/// Key-value byte store.
///
/// All implementations must satisfy these invariants:
/// - `read` of a missing key returns [`StoreError::NotFound`](crate::StoreError::NotFound).
/// - `erase` of a missing key succeeds (removal is idempotent).
/// - A write replaces the whole value; a concurrent reader sees either the
///   old value or the new one.
/// - Operations on distinct keys never interfere.
/// - The store never interprets values.
pub trait KvStore: Send + Sync {
    /// Store `data` under `key`, replacing any previous value.
    fn write(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Read the whole value stored under `key`.
    fn read(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// Remove `key`. Succeeds if the key does not exist.
    fn erase(&self, key: &str) -> StoreResult<()>;

    /// Store everything `reader` yields under `key`, returning the byte count.
    ///
    /// The reader is drained exactly once. Implementations should not hold
    /// the whole value in memory.
    fn write_stream(&self, key: &str, reader: &mut dyn Read) -> StoreResult<u64>;

    /// Open a streaming reader over the value stored under `key`.
    ///
    /// The underlying handle is released when the reader is dropped.
    fn read_stream(&self, key: &str) -> StoreResult<Box<dyn Read + Send>>;

    /// Enumerate every key.
    ///
    /// The sequence is lazy and restartable: each call starts a fresh
    /// enumeration. Order is implementation-defined.
    fn keys(&self) -> KeyIter<'_>;

    /// Check whether `key` exists.
    fn contains(&self, key: &str) -> StoreResult<bool>;

    /// Set the storage-level modification time of `key` to now.
    fn touch(&self, key: &str) -> StoreResult<()>;

    /// Storage-level modification time of `key`.
    fn modified(&self, key: &str) -> StoreResult<SystemTime>;

    /// Move the value under `from` to `to`, replacing any value at `to`.
    ///
    /// Default implementation streams `from` into `to` and then erases
    /// `from`. Backends may override with a native rename.
    fn rename(&self, from: &str, to: &str) -> StoreResult<()> {
        let mut reader = self.read_stream(from)?;
        self.write_stream(to, &mut reader)?;
        drop(reader);
        self.erase(from)
    }

    /// Enumerate keys starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> KeyIter<'_> {
        let prefix = prefix.to_string();
        Box::new(
            self.keys()
                .filter(move |key| key.as_ref().map_or(true, |k| k.starts_with(&prefix))),
        )
    }
}
