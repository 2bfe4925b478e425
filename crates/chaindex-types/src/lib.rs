//! Foundation types for the chaindex digest pipeline.
//!
//! These are the inputs the digester consumes: a finalized [`Block`] with its
//! ordered [`Operation`]s, the [`StateEntry`] effects they produced, and the
//! [`OperationsTree`] recording which operations were applied.
//!
//! # Key Types
//!
//! - [`FactHash`] -- BLAKE3 identity of an operation fact
//! - [`Height`] -- block height
//! - [`Block`] -- immutable, finalized block
//! - [`OperationsTree`] -- fixed Merkle tree keyed by fact hash
//! - [`StateEntry`] -- one keyed post-execution effect
//!
//! The [`state`] module also owns the state-key grammar (`{address}:account`,
//! `nft:{contract}:{collection}:{index}:nft`, ...) that the digester
//! classifies on.

pub mod block;
pub mod error;
pub mod hash;
pub mod operation;
pub mod state;
pub mod tree;

pub use block::{Block, Height};
pub use error::TypeError;
pub use hash::FactHash;
pub use operation::Operation;
pub use state::{NftId, StateEntry};
pub use tree::{OperationOutcome, OperationsTree, TreeNode};
