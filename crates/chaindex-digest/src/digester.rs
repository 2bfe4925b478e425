use std::sync::Arc;

use chaindex_store::{CancellationToken, DigestStore};
use chaindex_types::{Block, Height};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::DigestConfig;
use crate::error::{DigestError, DigestResult};
use crate::session::{BlockSession, CommitReport};

/// Digests blocks one at a time, in strictly increasing height order.
///
/// Each block gets its own [`BlockSession`]. A block that fails can be
/// re-driven: the digested height only advances on a successful commit.
pub struct Digester {
    store: Arc<dyn DigestStore>,
    config: DigestConfig,
    last: Mutex<Option<Height>>,
}

impl Digester {
    pub fn new(store: Arc<dyn DigestStore>, config: DigestConfig) -> DigestResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            last: Mutex::new(None),
        })
    }

    /// Resume after `height`, e.g. from a height recorded by a previous run.
    pub fn resume_from(self, height: Height) -> Self {
        Self {
            last: Mutex::new(Some(height)),
            ..self
        }
    }

    pub fn config(&self) -> &DigestConfig {
        &self.config
    }

    /// Height of the last block committed through this digester.
    pub async fn last_height(&self) -> Option<Height> {
        *self.last.lock().await
    }

    /// Prepare and commit `block`.
    ///
    /// Holds the digester lock for the whole block, so concurrent callers are
    /// serialized. Blocks at or below the last digested height are rejected.
    pub async fn digest(
        &self,
        ctx: &CancellationToken,
        block: Arc<Block>,
    ) -> DigestResult<CommitReport> {
        let mut last = self.last.lock().await;
        let height = block.height();
        if let Some(prev) = *last {
            if height <= prev {
                return Err(DigestError::Precondition(format!(
                    "block {height} is not above last digested block {prev}"
                )));
            }
        }

        let session = BlockSession::new(self.store.as_ref(), block, &self.config)?;
        if let Err(e) = session.prepare().await {
            warn!(session = %session.id(), %height, error = %e, "prepare failed");
            if let Err(close_err) = session.close().await {
                warn!(session = %session.id(), error = %close_err, "failed to close session");
            }
            return Err(e);
        }

        let report = session.commit(ctx).await?;
        *last = Some(height);
        info!(
            %height,
            documents = report.collections.iter().map(|c| c.stats.documents).sum::<usize>(),
            "block digested"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Digester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Digester")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
