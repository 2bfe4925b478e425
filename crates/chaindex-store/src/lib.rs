//! Document store boundary for the chaindex digester.
//!
//! The digester writes JSON [`Document`]s into named collections of a
//! document store. This crate defines that boundary and an in-memory backend.
//!
//! # Operations
//!
//! - unordered multi-document insert per collection ([`StoreConnection::bulk_write`])
//! - delete-by-filter on height range plus one field ([`StoreConnection::delete_many`])
//!
//! # Backends
//!
//! All backends implement [`DigestStore`], which hands out dedicated
//! [`StoreConnection`]s:
//!
//! - [`InMemoryDigestStore`] -- map-backed store for tests and embedding,
//!   with a write journal and fault injection
//!
//! # Design Rules
//!
//! 1. Every connection call takes a cancellation token and checks it before
//!    touching the backend.
//! 2. A closed connection rejects every call.
//! 3. Backend errors are propagated, never swallowed.

pub mod document;
pub mod error;
pub mod memory;
pub mod traits;

pub use document::{DeleteFilter, Document, WriteModel};
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryDigestStore, JournalEntry, JournalOp};
pub use traits::{BulkWriteResult, DigestStore, StoreConnection};
pub use tokio_util::sync::CancellationToken;
