//! Flat lookup over a block's operations tree.

use std::collections::HashMap;

use chaindex_types::{FactHash, OperationsTree};

use crate::error::{DigestError, DigestResult};

/// Outcome recorded in the tree for one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    pub in_state: bool,
    pub reason: Option<String>,
}

/// Fact hash -> outcome map, built with one traversal of the tree so that
/// per-operation lookups never walk it again.
#[derive(Clone, Debug, Default)]
pub struct OperationsTreeIndex {
    nodes: HashMap<FactHash, TreeEntry>,
}

impl OperationsTreeIndex {
    /// Traverse `tree` once, verifying every node.
    ///
    /// Fails on a corrupted node or on two nodes claiming the same fact.
    pub fn build(tree: &OperationsTree) -> DigestResult<Self> {
        let mut nodes = HashMap::with_capacity(tree.len());
        let mut duplicate = None;

        tree.traverse(|node| {
            let entry = TreeEntry {
                in_state: node.in_state,
                reason: node.reason.clone(),
            };
            if nodes.insert(node.key, entry).is_some() {
                duplicate = Some(node.key);
                return Ok(false);
            }
            Ok(true)
        })
        .map_err(|e| DigestError::validation("operations tree", e))?;

        if let Some(fact) = duplicate {
            return Err(DigestError::validation(
                "operations tree",
                format!("fact {fact} appears more than once"),
            ));
        }

        Ok(Self { nodes })
    }

    pub fn lookup(&self, fact: &FactHash) -> Option<&TreeEntry> {
        self.nodes.get(fact)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
