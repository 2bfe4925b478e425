/// Errors from document store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The caller cancelled the operation before it reached the backend.
    #[error("operation cancelled")]
    Cancelled,

    /// The connection was already closed.
    #[error("connection is closed")]
    ConnectionClosed,

    /// The store is read-only.
    #[error("store is read-only")]
    ReadOnly,

    /// A value could not be represented as a document.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Failure reported by the backend for a collection.
    #[error("backend error on {collection}: {reason}")]
    Backend { collection: String, reason: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
