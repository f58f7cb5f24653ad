use std::fmt;

use arca_crypto::HasherError;
use arca_store::StoreError;
use arca_types::ContentId;
use thiserror::Error;

/// Which of the two backing stores an error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Blob,
    Metadata,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => f.write_str("blob"),
            Self::Metadata => f.write_str("metadata"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("file not found: {0}")]
    NotFound(ContentId),

    #[error("corrupt metadata record {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("failed to encode metadata: {0}")]
    Encode(String),

    #[error("{store} store write failed: {source}")]
    BackendWrite {
        store: StoreKind,
        #[source]
        source: StoreError,
    },

    #[error("{store} store read failed: {source}")]
    BackendRead {
        store: StoreKind,
        #[source]
        source: StoreError,
    },

    #[error("hash configuration error: {0}")]
    HashConfiguration(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub(crate) fn write(store: StoreKind, source: StoreError) -> Self {
        Self::BackendWrite { store, source }
    }

    pub(crate) fn read(store: StoreKind, source: StoreError) -> Self {
        Self::BackendRead { store, source }
    }

    /// Backend read error for `id`, folding a missing key into [`Self::NotFound`].
    pub(crate) fn read_of(store: StoreKind, id: &ContentId, source: StoreError) -> Self {
        if source.is_not_found() {
            Self::NotFound(id.clone())
        } else {
            Self::read(store, source)
        }
    }

    /// Backend write error for `id`, folding a missing key into [`Self::NotFound`].
    pub(crate) fn write_of(store: StoreKind, id: &ContentId, source: StoreError) -> Self {
        if source.is_not_found() {
            Self::NotFound(id.clone())
        } else {
            Self::write(store, source)
        }
    }
}

/// Only a rejected hasher configuration is a configuration error; a failed
/// source read stays an I/O error.
impl From<HasherError> for ArchiveError {
    fn from(err: HasherError) -> Self {
        match err {
            HasherError::Configuration(reason) => Self::HashConfiguration(reason),
            HasherError::Io(e) => Self::Io(e),
        }
    }
}

pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn hasher_configuration_maps_to_hash_configuration() {
        let err = ArchiveError::from(HasherError::Configuration("blank tag".into()));
        assert!(matches!(err, ArchiveError::HashConfiguration(ref r) if r == "blank tag"));
    }

    #[test]
    fn hasher_io_maps_to_io() {
        let err = ArchiveError::from(HasherError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "source ended",
        )));
        match err {
            ArchiveError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn backend_not_found_folds_into_not_found() {
        let id = ContentId::parse("deadbeef").unwrap();
        let err = ArchiveError::read_of(StoreKind::Blob, &id, StoreError::NotFound("deadbeef".into()));
        assert!(err.is_not_found());
        let err = ArchiveError::write_of(
            StoreKind::Metadata,
            &id,
            StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full")),
        );
        assert!(matches!(
            err,
            ArchiveError::BackendWrite {
                store: StoreKind::Metadata,
                ..
            }
        ));
    }
}
