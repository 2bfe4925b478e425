use chaindex_store::StoreError;
use chaindex_types::{FactHash, TypeError};

/// Errors produced while digesting a block.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// Malformed or unreadable operation or state input.
    #[error("invalid {what}: {reason}")]
    Validation { what: String, reason: String },

    /// An operation has no node in the operations tree. The block is
    /// corrupted or incomplete.
    #[error("operation {fact} not found in operations tree")]
    NotFound { fact: FactHash },

    /// The store failed. `context` names the collection (and chunk) or the
    /// lifecycle step that was running.
    #[error("store error ({context}): {source}")]
    Store {
        context: String,
        #[source]
        source: StoreError,
    },

    /// A bulk write was acknowledged but inserted nothing.
    #[error("not inserted to {collection}: chunk {chunk} of {len} document(s) reported 0 inserted")]
    Consistency {
        collection: String,
        chunk: usize,
        len: usize,
    },

    /// Wrong lifecycle state, or a read-only store.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("config error: {0}")]
    Config(String),
}

impl DigestError {
    pub(crate) fn validation(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Validation {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    /// Whether the error came from a caller cancelling the store call.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Store {
                source: StoreError::Cancelled,
                ..
            }
        )
    }
}

impl From<TypeError> for DigestError {
    fn from(e: TypeError) -> Self {
        Self::validation("block input", e)
    }
}

/// Result alias for digest operations.
pub type DigestResult<T> = Result<T, DigestError>;
