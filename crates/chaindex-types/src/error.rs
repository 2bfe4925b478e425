use thiserror::Error;

/// Errors produced while constructing or verifying input types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("malformed state key {key:?}: {reason}")]
    InvalidStateKey { key: String, reason: String },

    #[error("operations tree corrupted at node {index}: {reason}")]
    TreeCorrupted { index: usize, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
