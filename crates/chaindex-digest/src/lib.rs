//! Block digest pipeline for chaindex.
//!
//! Projects each finalized block into flat document collections a query
//! layer can read: one document per operation (with its applied/rejected
//! outcome) and one per indexed state entry.
//!
//! # Pipeline
//!
//! 1. [`BlockSession::prepare`] indexes the operations tree, builds operation
//!    documents and classifies every state entry into an entity document.
//! 2. [`BlockSession::commit`] writes the buffers collection by collection in
//!    [`COMMIT_ORDER`], in chunks of at most
//!    [`DigestConfig::bulk_write_limit`] documents, cleaning stale NFT rows
//!    right before NFTs are inserted.
//! 3. The session closes and releases its store connection.
//!
//! [`Digester`] drives one session per block in increasing height order.

pub mod batch;
pub mod classify;
pub mod collection;
pub mod config;
pub mod digester;
pub mod entity;
pub mod error;
mod guard;
pub mod operation;
pub mod session;
pub mod tree_index;

pub use batch::{BulkWriter, WriteStats};
pub use classify::{build_entity, classify, Classified, EntityKind};
pub use collection::{Collection, COMMIT_ORDER};
pub use config::{DigestConfig, DEFAULT_BULK_WRITE_LIMIT};
pub use digester::Digester;
pub use entity::{EntityDocument, NFT_ID_FIELD};
pub use error::{DigestError, DigestResult};
pub use operation::{build_operation_models, OperationDoc};
pub use session::{BlockSession, CollectionReport, CommitReport, SessionPhase};
pub use tree_index::{OperationsTreeIndex, TreeEntry};
