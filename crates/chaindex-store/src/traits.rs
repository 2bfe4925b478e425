use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::document::{DeleteFilter, WriteModel};
use crate::error::StoreResult;

/// Outcome of one bulk write round trip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted_count: u64,
}

/// A document store the digester can project blocks into.
pub trait DigestStore: Send + Sync {
    /// Whether the store rejects writes. Sessions refuse to open on a
    /// read-only store.
    fn is_read_only(&self) -> bool;

    /// Open a dedicated connection, independent of any shared handle.
    fn connect(&self) -> StoreResult<Box<dyn StoreConnection>>;
}

/// A dedicated connection to a [`DigestStore`].
///
/// All implementations must satisfy these invariants:
/// - A cancelled token fails the call with `StoreError::Cancelled` before
///   anything reaches the backend.
/// - After [`close`](Self::close), every call fails with
///   `StoreError::ConnectionClosed`.
#[async_trait]
pub trait StoreConnection: Send + Sync {
    /// Insert `models` into `collection` in one unordered round trip.
    ///
    /// Unordered: a failing document does not prevent the others in the same
    /// call from being written. Any error is reported for the call as a
    /// whole.
    async fn bulk_write(
        &self,
        ctx: &CancellationToken,
        collection: &str,
        models: &[WriteModel],
    ) -> StoreResult<BulkWriteResult>;

    /// Delete every document in `collection` matching `filter`. Returns the
    /// number of deleted documents.
    async fn delete_many(
        &self,
        ctx: &CancellationToken,
        collection: &str,
        filter: &DeleteFilter,
    ) -> StoreResult<u64>;

    /// Release the connection. Closing twice fails with
    /// `StoreError::ConnectionClosed`.
    fn close(&mut self) -> StoreResult<()>;
}
