//! Key-value storage backends for the Arca archive.
//!
//! The archive keeps two independent keyed stores, one for blobs and one for
//! metadata records. Both are driven through the [`KvStore`] trait, a plain
//! byte store with point operations, streaming reads/writes and lazy key
//! enumeration. The store never interprets values.
//!
//! # Backends
//!
//! - [`InMemoryKv`]: `BTreeMap`-based store for tests and embedding
//! - [`DiskKv`]: one file per key under a block-sharded directory tree
//!
//! # Design Rules
//!
//! 1. Erasing a missing key is not an error.
//! 2. Reading a missing key is [`StoreError::NotFound`].
//! 3. Writes replace the whole value; readers never observe a partial value.
//! 4. Point operations on distinct keys never interfere.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod disk;
pub mod error;
pub mod keys;
pub mod memory;
pub mod traits;

pub use disk::{DiskKv, DiskKvConfig};
pub use error::{StoreError, StoreResult};
pub use keys::validate_key;
pub use memory::InMemoryKv;
pub use traits::{KeyIter, KvStore};
