use thiserror::Error;

/// Errors produced when parsing or validating identifier types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("identifier must be lower-case hex: {0}")]
    NotLowercase(String),
}
