//! Content-addressable file archive.
//!
//! An [`Archive`] stores each distinct piece of content once, keyed by a
//! short [`ContentId`] derived from the bytes themselves, and keeps a
//! [`MetadataRecord`] (display names, size, checksum, custom attachment)
//! under the same key in a second store.
//!
//! ```
//! use arca_archive::Archive;
//!
//! let archive = Archive::in_memory("scratch");
//! let id = archive.add_file("notes/todo.txt", b"buy milk").unwrap();
//! let (record, data) = archive.get_file(&id).unwrap();
//! assert_eq!(data, b"buy milk");
//! assert_eq!(record.canonical_name(), Some("todo.txt"));
//! ```
//!
//! Disk archives are opened with [`Archive::open`] and lay out as
//! `<root>/arca.toml`, `<root>/blobstore/` and `<root>/metastore/`.
//!
//! [`ContentId`]: arca_types::ContentId

pub mod archive;
pub mod config;
pub mod error;
pub mod record;

pub use archive::Archive;
pub use config::{ArchiveConfig, CONFIG_FILE};
pub use error::{ArchiveError, ArchiveResult, StoreKind};
pub use record::{CustomData, MetadataRecord};

pub use arca_types::{Checksum, ContentId};
