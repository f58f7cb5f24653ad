//! Foundation types for the Arca content-addressable archive.
//!
//! Every other Arca crate depends on `arca-types`. The types here are plain
//! values: they carry no storage handles and perform no I/O.
//!
//! # Key Types
//!
//! - [`ContentId`]: short, content-derived key shared by the blob and metadata stores
//! - [`Checksum`]: 32-byte verification hash of a file's full content
//! - [`StagingKey`]: provisional blob key used while a stream is being ingested

pub mod checksum;
pub mod content_id;
pub mod error;
pub mod staging;

pub use checksum::Checksum;
pub use content_id::ContentId;
pub use error::TypeError;
pub use staging::StagingKey;
