use std::time::{Duration, Instant};

use chaindex_store::{CancellationToken, StoreConnection, WriteModel};
use tracing::{debug, warn};

use crate::error::{DigestError, DigestResult};

/// What one collection write did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub documents: usize,
    pub inserted: u64,
    pub chunks: usize,
    pub elapsed: Duration,
}

/// Writes a collection's models in bounded, sequential chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BulkWriter {
    limit: usize,
}

impl BulkWriter {
    /// `limit` is clamped to at least one.
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Number of round trips needed for `n` models.
    pub fn chunk_count(&self, n: usize) -> usize {
        n.div_ceil(self.limit)
    }

    /// Write `models` into `collection`, one unordered bulk write per chunk.
    ///
    /// Chunks run one after another. The first failing chunk stops the
    /// collection; the error names its index so the unresolved slice is
    /// `models[chunk * limit..]`. A chunk acknowledged with zero inserts is a
    /// [`DigestError::Consistency`] failure.
    pub async fn write(
        &self,
        ctx: &CancellationToken,
        conn: &dyn StoreConnection,
        collection: &str,
        models: &[WriteModel],
    ) -> DigestResult<WriteStats> {
        let started = Instant::now();
        let mut stats = WriteStats {
            documents: models.len(),
            ..WriteStats::default()
        };

        for (chunk, slice) in models.chunks(self.limit).enumerate() {
            let res = conn
                .bulk_write(ctx, collection, slice)
                .await
                .map_err(|e| DigestError::store(format!("{collection} chunk {chunk}"), e))?;

            if res.inserted_count == 0 {
                return Err(DigestError::Consistency {
                    collection: collection.to_string(),
                    chunk,
                    len: slice.len(),
                });
            }
            if res.inserted_count < slice.len() as u64 {
                warn!(
                    collection,
                    chunk,
                    expected = slice.len(),
                    inserted = res.inserted_count,
                    "bulk write inserted fewer documents than sent"
                );
            }

            stats.inserted += res.inserted_count;
            stats.chunks += 1;
        }

        stats.elapsed = started.elapsed();
        debug!(
            collection,
            documents = stats.documents,
            chunks = stats.chunks,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "wrote models"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use chaindex_store::{DigestStore, Document, InMemoryDigestStore, JournalOp, StoreError};
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn models(n: usize) -> Vec<WriteModel> {
        (0..n)
            .map(|i| WriteModel::insert(Document::encode(&json!({"i": i, "height": 1})).unwrap()))
            .collect()
    }

    fn chunk_sizes(store: &InMemoryDigestStore) -> Vec<u64> {
        store
            .journal()
            .into_iter()
            .map(|e| match e.op {
                JournalOp::Insert { count } => count,
                JournalOp::Delete { .. } => panic!("unexpected delete"),
            })
            .collect()
    }

    #[tokio::test]
    async fn splits_into_bounded_chunks() {
        let store = InMemoryDigestStore::new();
        let conn = store.connect().unwrap();
        let writer = BulkWriter::new(500);

        let stats = writer
            .write(&CancellationToken::new(), conn.as_ref(), "digest_op", &models(1200))
            .await
            .unwrap();

        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.inserted, 1200);
        assert_eq!(chunk_sizes(&store), vec![500, 500, 200]);
        assert_eq!(store.count("digest_op"), 1200);
    }

    #[tokio::test]
    async fn empty_input_makes_no_calls() {
        let store = InMemoryDigestStore::new();
        let conn = store.connect().unwrap();
        let stats = BulkWriter::new(10)
            .write(&CancellationToken::new(), conn.as_ref(), "digest_op", &[])
            .await
            .unwrap();
        assert_eq!(stats.chunks, 0);
        assert!(store.journal().is_empty());
    }

    #[tokio::test]
    async fn failing_chunk_stops_the_collection() {
        let store = InMemoryDigestStore::new();
        store.fail_inserts_into("digest_op", 1);
        let conn = store.connect().unwrap();

        let err = BulkWriter::new(2)
            .write(&CancellationToken::new(), conn.as_ref(), "digest_op", &models(6))
            .await
            .unwrap_err();

        match err {
            DigestError::Store { context, source } => {
                assert_eq!(context, "digest_op chunk 1");
                assert!(matches!(source, StoreError::Backend { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.count("digest_op"), 2);
    }

    #[tokio::test]
    async fn zero_inserted_is_a_consistency_failure() {
        let store = InMemoryDigestStore::new();
        store.drop_inserts_into("digest_ac");
        let conn = store.connect().unwrap();

        let err = BulkWriter::new(10)
            .write(&CancellationToken::new(), conn.as_ref(), "digest_ac", &models(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DigestError::Consistency { chunk: 0, len: 3, .. }
        ));
    }

    #[tokio::test]
    async fn cancellation_surfaces_as_store_error() {
        let store = InMemoryDigestStore::new();
        let conn = store.connect().unwrap();
        let ctx = CancellationToken::new();
        ctx.cancel();
        let err = BulkWriter::new(10)
            .write(&ctx, conn.as_ref(), "digest_op", &models(1))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn zero_limit_is_clamped() {
        assert_eq!(BulkWriter::new(0).limit(), 1);
    }

    proptest! {
        #[test]
        fn chunk_count_is_ceiling(n in 0usize..10_000, limit in 1usize..1_000) {
            let writer = BulkWriter::new(limit);
            prop_assert_eq!(writer.chunk_count(n), (n + limit - 1) / limit);
            prop_assert_eq!(writer.chunk_count(n), models_chunks(n, limit));
        }
    }

    fn models_chunks(n: usize, limit: usize) -> usize {
        vec![(); n].chunks(limit).count()
    }
}
