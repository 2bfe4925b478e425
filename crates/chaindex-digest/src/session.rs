//! One block's digest session.
//!
//! A [`BlockSession`] moves through `Created -> Prepared -> Closed`. Commit
//! runs from `Prepared`, and always ends in `Closed` whether it succeeded or
//! not; `Closed` is also reachable directly through [`BlockSession::close`].
//! Every phase runs under one session-wide lock, so two phases of the same
//! session never interleave.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chaindex_store::{CancellationToken, DeleteFilter, DigestStore, StoreConnection, WriteModel};
use chaindex_types::{Block, Height};
use tokio::sync::Mutex;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::batch::{BulkWriter, WriteStats};
use crate::classify::build_entity;
use crate::collection::{Collection, COMMIT_ORDER};
use crate::config::DigestConfig;
use crate::entity::NFT_ID_FIELD;
use crate::error::{DigestError, DigestResult};
use crate::guard::ConnectionGuard;
use crate::operation::build_operation_models;
use crate::tree_index::OperationsTreeIndex;

/// Observable lifecycle phase of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    Prepared,
    Closed,
}

/// Per-collection outcome of a commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionReport {
    pub collection: Collection,
    pub stats: WriteStats,
}

/// Outcome of a successful commit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitReport {
    pub height: Height,
    /// Collections in the order they were written.
    pub collections: Vec<CollectionReport>,
    /// Stale NFT rows removed by cleanup.
    pub deleted: u64,
    pub elapsed: Duration,
}

impl CommitReport {
    /// Documents written to `collection`.
    pub fn documents(&self, collection: Collection) -> usize {
        self.collections
            .iter()
            .find(|c| c.collection == collection)
            .map_or(0, |c| c.stats.documents)
    }

    /// Collections written, in order.
    pub fn order(&self) -> Vec<Collection> {
        self.collections.iter().map(|c| c.collection).collect()
    }
}

/// Write models staged by prepare, grouped by collection.
#[derive(Default)]
struct Staged {
    models: BTreeMap<Collection, Vec<WriteModel>>,
    /// Identifiers of mutable rows to replace, per collection, in staging
    /// order; may repeat.
    replaced: BTreeMap<Collection, Vec<String>>,
}

enum Phase {
    Created,
    Prepared(Staged),
    Closed { committed: bool },
}

struct SessionInner {
    phase: Phase,
    block: Option<Arc<Block>>,
    conn: ConnectionGuard,
    writer: BulkWriter,
    timings: BTreeMap<String, Duration>,
}

impl SessionInner {
    fn take_staged(&mut self) -> DigestResult<Staged> {
        match std::mem::replace(&mut self.phase, Phase::Created) {
            Phase::Prepared(staged) => Ok(staged),
            Phase::Created => Err(DigestError::Precondition(
                "commit called before prepare".into(),
            )),
            closed @ Phase::Closed { .. } => {
                self.phase = closed;
                Err(closed_error())
            }
        }
    }

    /// Drop buffers and the block, and release the connection.
    fn close(&mut self, committed: bool) -> DigestResult<()> {
        self.phase = Phase::Closed { committed };
        self.block = None;
        self.conn.release()
    }
}

/// Digests one block into a [`DigestStore`] over a dedicated connection.
pub struct BlockSession {
    id: Uuid,
    height: Height,
    inner: Mutex<SessionInner>,
}

impl BlockSession {
    /// Open a session for `block`.
    ///
    /// Fails with [`DigestError::Precondition`] on a read-only store, before
    /// any connection is opened.
    pub fn new(
        store: &dyn DigestStore,
        block: Arc<Block>,
        config: &DigestConfig,
    ) -> DigestResult<Self> {
        if store.is_read_only() {
            return Err(DigestError::Precondition("store is read-only".into()));
        }
        config.validate()?;

        let conn = store
            .connect()
            .map_err(|e| DigestError::store("connect", e))?;
        let id = Uuid::now_v7();
        let height = block.height();
        debug!(session = %id, %height, "session created");

        Ok(Self {
            id,
            height,
            inner: Mutex::new(SessionInner {
                phase: Phase::Created,
                block: Some(block),
                conn: ConnectionGuard::new(conn),
                writer: BulkWriter::new(config.bulk_write_limit),
                timings: BTreeMap::new(),
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub async fn phase(&self) -> SessionPhase {
        match self.inner.lock().await.phase {
            Phase::Created => SessionPhase::Created,
            Phase::Prepared(_) => SessionPhase::Prepared,
            Phase::Closed { .. } => SessionPhase::Closed,
        }
    }

    /// Whether the session closed after a successful commit.
    pub async fn was_committed(&self) -> bool {
        matches!(
            self.inner.lock().await.phase,
            Phase::Closed { committed: true }
        )
    }

    /// Wall-clock timings: `prepare`, `commit`, `cleanup-digest_nft` and one
    /// `write-models-{collection}` per written collection.
    pub async fn timings(&self) -> BTreeMap<String, Duration> {
        self.inner.lock().await.timings.clone()
    }

    /// Staged document counts per collection, while prepared.
    pub async fn staged(&self) -> Option<BTreeMap<Collection, usize>> {
        match &self.inner.lock().await.phase {
            Phase::Prepared(staged) => Some(
                staged
                    .models
                    .iter()
                    .map(|(c, models)| (*c, models.len()))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Build every document of the block in memory.
    ///
    /// Runs the operations-tree index, the operation builder and the state
    /// classifier. Any failure leaves the session in `Created` with nothing
    /// staged.
    pub async fn prepare(&self) -> DigestResult<()> {
        let mut inner = self.inner.lock().await;
        match inner.phase {
            Phase::Created => {}
            Phase::Prepared(_) => {
                return Err(DigestError::Precondition(
                    "session already prepared".into(),
                ))
            }
            Phase::Closed { .. } => return Err(closed_error()),
        }
        let block = inner.block.clone().ok_or_else(closed_error)?;

        let started = Instant::now();
        let staged = stage(&block)?;
        inner.timings.insert("prepare".into(), started.elapsed());

        info!(
            session = %self.id,
            height = %self.height,
            operations = block.operations().len(),
            states = block.states().len(),
            staged = staged.models.values().map(Vec::len).sum::<usize>(),
            "block prepared"
        );
        inner.phase = Phase::Prepared(staged);
        Ok(())
    }

    /// Write the staged documents, then close the session.
    ///
    /// Collections are written in [`COMMIT_ORDER`], stopping at the first
    /// failure. The session is closed afterwards in every case; a failed
    /// commit must be re-driven with a new session for the whole block.
    /// Calling this before [`prepare`](Self::prepare) fails without writing
    /// and leaves the session open.
    pub async fn commit(&self, ctx: &CancellationToken) -> DigestResult<CommitReport> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        let staged = inner.take_staged()?;

        let started = Instant::now();
        let result = match inner.conn.get() {
            Ok(conn) => {
                write_staged(
                    ctx,
                    conn,
                    &inner.writer,
                    &mut inner.timings,
                    self.height,
                    staged,
                )
                .await
            }
            Err(e) => Err(e),
        };
        let elapsed = started.elapsed();
        inner.timings.insert("commit".into(), elapsed);

        if let Err(e) = inner.close(result.is_ok()) {
            warn!(session = %self.id, error = %e, "failed to close session after commit");
        }

        match result {
            Ok(mut report) => {
                report.elapsed = elapsed;
                info!(
                    session = %self.id,
                    height = %self.height,
                    deleted = report.deleted,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "block committed"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(session = %self.id, height = %self.height, error = %e, "commit failed");
                Err(e)
            }
        }
    }

    /// Release the connection and drop all buffers. Fails if the session is
    /// already closed.
    pub async fn close(&self) -> DigestResult<()> {
        let mut inner = self.inner.lock().await;
        if matches!(inner.phase, Phase::Closed { .. }) {
            return Err(closed_error());
        }
        debug!(session = %self.id, "session closed");
        inner.close(false)
    }
}

impl std::fmt::Debug for BlockSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockSession")
            .field("id", &self.id)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

fn closed_error() -> DigestError {
    DigestError::Precondition("session is closed".into())
}

fn stage(block: &Block) -> DigestResult<Staged> {
    let tree = OperationsTreeIndex::build(block.operations_tree())?;

    let mut staged = Staged::default();
    let operations = build_operation_models(block, &tree)?;
    if !operations.is_empty() {
        staged.models.insert(Collection::Operation, operations);
    }

    for entry in block.states() {
        let Some(classified) = build_entity(entry, block.height())? else {
            trace!(key = %entry.key, "skipping unindexed state");
            continue;
        };
        let collection = classified.kind.collection();
        if classified.kind.is_mutable() {
            if let Some(id) = classified.entity.nft_id {
                staged.replaced.entry(collection).or_default().push(id);
            }
        }
        staged
            .models
            .entry(collection)
            .or_default()
            .push(WriteModel::insert(classified.entity.document));
    }

    Ok(staged)
}

async fn write_staged(
    ctx: &CancellationToken,
    conn: &dyn StoreConnection,
    writer: &BulkWriter,
    timings: &mut BTreeMap<String, Duration>,
    height: Height,
    mut staged: Staged,
) -> DigestResult<CommitReport> {
    let mut report = CommitReport {
        height,
        collections: Vec::new(),
        deleted: 0,
        elapsed: Duration::ZERO,
    };

    for collection in COMMIT_ORDER {
        let models = staged.models.remove(&collection).unwrap_or_default();
        if models.is_empty() && !collection.always_written() {
            continue;
        }

        if let Some(ids) = staged.replaced.remove(&collection) {
            let started = Instant::now();
            let deleted = clean_replaced(ctx, conn, collection, height, &ids).await;
            timings.insert(format!("cleanup-{collection}"), started.elapsed());
            report.deleted += deleted?;
        }

        let started = Instant::now();
        let stats = writer.write(ctx, conn, collection.name(), &models).await;
        timings.insert(format!("write-models-{collection}"), started.elapsed());
        report.collections.push(CollectionReport {
            collection,
            stats: stats?,
        });
    }

    Ok(report)
}

/// Delete rows of `collection` below `height` for each distinct id, one id
/// at a time.
async fn clean_replaced(
    ctx: &CancellationToken,
    conn: &dyn StoreConnection,
    collection: Collection,
    height: Height,
    ids: &[String],
) -> DigestResult<u64> {
    let mut seen = HashSet::new();
    let mut deleted = 0;

    for id in ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        let filter = DeleteFilter::new(NFT_ID_FIELD, id.as_str(), height.get());
        deleted += conn
            .delete_many(ctx, collection.name(), &filter)
            .await
            .map_err(|e| DigestError::store(format!("cleanup {collection} for {id}"), e))?;
    }

    Ok(deleted)
}
