use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::document::{DeleteFilter, Document, WriteModel};
use crate::error::{StoreError, StoreResult};
use crate::traits::{BulkWriteResult, DigestStore, StoreConnection};

/// One successful store call, in the order calls reached the backend.
#[derive(Clone, Debug, PartialEq)]
pub struct JournalEntry {
    pub collection: String,
    pub op: JournalOp,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JournalOp {
    /// A bulk write that inserted `count` documents.
    Insert { count: u64 },
    /// A filtered delete on `value` that removed `count` documents.
    Delete { value: Value, count: u64 },
}

#[derive(Clone, Debug)]
enum InsertFault {
    /// Fail every call after the first `after_calls` succeed.
    Error { after_calls: usize, seen: usize },
    /// Acknowledge the call but insert nothing.
    Silent,
}

#[derive(Default)]
struct Shared {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
    journal: RwLock<Vec<JournalEntry>>,
    insert_faults: RwLock<HashMap<String, InsertFault>>,
    delete_faults: RwLock<HashMap<String, String>>,
    open: AtomicUsize,
    opened: AtomicUsize,
}

/// In-memory document store.
///
/// Intended for tests and embedding. Collections are vectors of documents
/// behind a `RwLock`; connections share the same state. Every successful call
/// is recorded in a journal so callers can assert on write order, and faults
/// can be injected per collection.
#[derive(Clone, Default)]
pub struct InMemoryDigestStore {
    shared: Arc<Shared>,
    read_only: bool,
}

impl InMemoryDigestStore {
    /// Create a new empty writable store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A read-only view over the same data.
    pub fn read_only(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            read_only: true,
        }
    }

    /// Pre-populate a collection, bypassing the journal.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        self.shared
            .collections
            .write()
            .expect("lock poisoned")
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }

    /// All documents currently in `collection`, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.shared
            .collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> usize {
        self.shared
            .collections
            .read()
            .expect("lock poisoned")
            .get(collection)
            .map_or(0, Vec::len)
    }

    /// Names of all non-empty collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.shared
            .collections
            .read()
            .expect("lock poisoned")
            .iter()
            .filter(|(_, docs)| !docs.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Successful calls so far, in order.
    pub fn journal(&self) -> Vec<JournalEntry> {
        self.shared.journal.read().expect("lock poisoned").clone()
    }

    /// Connections opened and not yet closed.
    pub fn open_connections(&self) -> usize {
        self.shared.open.load(Ordering::SeqCst)
    }

    /// Connections opened over the store's lifetime.
    pub fn connections_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Let the first `after_calls` bulk writes into `collection` succeed and
    /// fail every one after that.
    pub fn fail_inserts_into(&self, collection: &str, after_calls: usize) {
        self.shared.insert_faults.write().expect("lock poisoned").insert(
            collection.to_string(),
            InsertFault::Error {
                after_calls,
                seen: 0,
            },
        );
    }

    /// Make bulk writes into `collection` report success with zero inserts.
    pub fn drop_inserts_into(&self, collection: &str) {
        self.shared
            .insert_faults
            .write()
            .expect("lock poisoned")
            .insert(collection.to_string(), InsertFault::Silent);
    }

    /// Make deletes from `collection` fail.
    pub fn fail_deletes_from(&self, collection: &str, reason: &str) {
        self.shared
            .delete_faults
            .write()
            .expect("lock poisoned")
            .insert(collection.to_string(), reason.to_string());
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.shared.insert_faults.write().expect("lock poisoned").clear();
        self.shared.delete_faults.write().expect("lock poisoned").clear();
    }
}

impl DigestStore for InMemoryDigestStore {
    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn connect(&self) -> StoreResult<Box<dyn StoreConnection>> {
        self.shared.open.fetch_add(1, Ordering::SeqCst);
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection {
            shared: Arc::clone(&self.shared),
            read_only: self.read_only,
            closed: false,
        }))
    }
}

impl std::fmt::Debug for InMemoryDigestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDigestStore")
            .field("collections", &self.collection_names())
            .field("read_only", &self.read_only)
            .field("open_connections", &self.open_connections())
            .finish()
    }
}

struct InMemoryConnection {
    shared: Arc<Shared>,
    read_only: bool,
    closed: bool,
}

impl InMemoryConnection {
    fn check(&self, ctx: &CancellationToken) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        if ctx.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        Ok(())
    }

    fn record(&self, collection: &str, op: JournalOp) {
        self.shared
            .journal
            .write()
            .expect("lock poisoned")
            .push(JournalEntry {
                collection: collection.to_string(),
                op,
            });
    }
}

#[async_trait]
impl StoreConnection for InMemoryConnection {
    async fn bulk_write(
        &self,
        ctx: &CancellationToken,
        collection: &str,
        models: &[WriteModel],
    ) -> StoreResult<BulkWriteResult> {
        self.check(ctx)?;

        if let Some(fault) = self
            .shared
            .insert_faults
            .write()
            .expect("lock poisoned")
            .get_mut(collection)
        {
            match fault {
                InsertFault::Error { after_calls, seen } => {
                    *seen += 1;
                    if *seen > *after_calls {
                        return Err(StoreError::Backend {
                            collection: collection.to_string(),
                            reason: "injected insert failure".into(),
                        });
                    }
                }
                InsertFault::Silent => {
                    self.record(collection, JournalOp::Insert { count: 0 });
                    return Ok(BulkWriteResult { inserted_count: 0 });
                }
            }
        }

        let mut collections = self.shared.collections.write().expect("lock poisoned");
        let docs = collections.entry(collection.to_string()).or_default();
        let mut inserted = 0u64;
        for model in models {
            match model {
                WriteModel::InsertOne(doc) => {
                    docs.push(doc.clone());
                    inserted += 1;
                }
            }
        }
        drop(collections);

        trace!(collection, inserted, "bulk write");
        self.record(collection, JournalOp::Insert { count: inserted });
        Ok(BulkWriteResult {
            inserted_count: inserted,
        })
    }

    async fn delete_many(
        &self,
        ctx: &CancellationToken,
        collection: &str,
        filter: &DeleteFilter,
    ) -> StoreResult<u64> {
        self.check(ctx)?;

        if let Some(reason) = self
            .shared
            .delete_faults
            .read()
            .expect("lock poisoned")
            .get(collection)
        {
            return Err(StoreError::Backend {
                collection: collection.to_string(),
                reason: reason.clone(),
            });
        }

        let mut collections = self.shared.collections.write().expect("lock poisoned");
        let deleted = match collections.get_mut(collection) {
            Some(docs) => {
                let before = docs.len();
                docs.retain(|doc| !filter.matches(doc));
                (before - docs.len()) as u64
            }
            None => 0,
        };
        drop(collections);

        trace!(collection, deleted, "delete many");
        self.record(
            collection,
            JournalOp::Delete {
                value: filter.value.clone(),
                count: deleted,
            },
        );
        Ok(deleted)
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::ConnectionClosed);
        }
        self.closed = true;
        self.shared.open.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
