use chaindex_store::StoreConnection;
use tracing::warn;

use crate::error::{DigestError, DigestResult};

/// Owns a session's dedicated connection and closes it exactly once: on
/// [`release`](Self::release), or on drop if it was never released.
pub(crate) struct ConnectionGuard {
    conn: Option<Box<dyn StoreConnection>>,
}

impl ConnectionGuard {
    pub(crate) fn new(conn: Box<dyn StoreConnection>) -> Self {
        Self { conn: Some(conn) }
    }

    pub(crate) fn get(&self) -> DigestResult<&dyn StoreConnection> {
        self.conn
            .as_deref()
            .ok_or_else(|| DigestError::Precondition("connection already released".into()))
    }

    /// Close the connection. Later calls are no-ops.
    pub(crate) fn release(&mut self) -> DigestResult<()> {
        match self.conn.take() {
            Some(mut conn) => conn.close().map_err(|e| DigestError::store("close", e)),
            None => Ok(()),
        }
    }

    pub(crate) fn is_released(&self) -> bool {
        self.conn.is_none()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!(error = %e, "failed to close connection on drop");
        }
    }
}
