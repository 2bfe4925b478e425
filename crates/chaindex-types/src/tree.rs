use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::hash::FactHash;

/// Execution outcome of one operation, the payload of an operations-tree node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub fact: FactHash,
    pub in_state: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl OperationOutcome {
    pub fn applied(fact: FactHash) -> Self {
        Self {
            fact,
            in_state: true,
            reason: None,
        }
    }

    pub fn rejected(fact: FactHash, reason: impl Into<String>) -> Self {
        Self {
            fact,
            in_state: false,
            reason: Some(reason.into()),
        }
    }
}

/// A node of the fixed operations tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Position in the array layout.
    pub index: usize,
    /// Fact identity of the operation this node records.
    pub key: FactHash,
    /// Whether the operation was applied to the state.
    pub in_state: bool,
    /// Why the operation was not applied, if it was not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Hash over this node's fields and its children's hashes.
    #[serde(with = "hex::serde")]
    pub hash: [u8; 32],
}

/// Fixed Merkle tree recording the outcome of every operation in a block.
///
/// Nodes are laid out as a complete binary tree in an array: the children of
/// node `i` sit at `2i + 1` and `2i + 2`. A node's hash covers its own fields
/// and both child hashes, so the root commits to every outcome and any
/// tampered node is detected when the tree is traversed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationsTree {
    nodes: Vec<TreeNode>,
}

impl OperationsTree {
    /// Build a tree from operation outcomes, in block order.
    pub fn from_outcomes(outcomes: &[OperationOutcome]) -> Self {
        let mut nodes: Vec<TreeNode> = outcomes
            .iter()
            .enumerate()
            .map(|(index, o)| TreeNode {
                index,
                key: o.fact,
                in_state: o.in_state,
                reason: o.reason.clone(),
                hash: [0; 32],
            })
            .collect();

        // Children always have larger indices, so hash from the back.
        for i in (0..nodes.len()).rev() {
            let left = child_hash(&nodes, 2 * i + 1);
            let right = child_hash(&nodes, 2 * i + 2);
            nodes[i].hash = node_hash(&nodes[i], &left, &right);
        }

        Self { nodes }
    }

    /// Root hash. An empty tree has an all-zero root.
    pub fn root(&self) -> [u8; 32] {
        self.nodes.first().map(|n| n.hash).unwrap_or([0; 32])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TreeNode> {
        self.nodes.get(index)
    }

    /// Visit every node in index order, verifying each one first.
    ///
    /// The callback returns `Ok(false)` to stop early. A node whose position
    /// or hash does not check out aborts the traversal with
    /// [`TypeError::TreeCorrupted`].
    pub fn traverse<F>(&self, mut f: F) -> Result<(), TypeError>
    where
        F: FnMut(&TreeNode) -> Result<bool, TypeError>,
    {
        for (i, node) in self.nodes.iter().enumerate() {
            if node.index != i {
                return Err(TypeError::TreeCorrupted {
                    index: i,
                    reason: format!("node claims index {}", node.index),
                });
            }
            let left = child_hash(&self.nodes, 2 * i + 1);
            let right = child_hash(&self.nodes, 2 * i + 2);
            if node_hash(node, &left, &right) != node.hash {
                return Err(TypeError::TreeCorrupted {
                    index: i,
                    reason: "hash mismatch".into(),
                });
            }
            if !f(node)? {
                break;
            }
        }
        Ok(())
    }

    /// Verify every node without visiting.
    pub fn verify(&self) -> Result<(), TypeError> {
        self.traverse(|_| Ok(true))
    }
}

fn child_hash(nodes: &[TreeNode], index: usize) -> [u8; 32] {
    nodes.get(index).map(|n| n.hash).unwrap_or([0; 32])
}

fn node_hash(node: &TreeNode, left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"chaindex-optree-v1:");
    hasher.update(&(node.index as u64).to_le_bytes());
    hasher.update(node.key.as_bytes());
    hasher.update(&[node.in_state as u8]);
    match &node.reason {
        Some(reason) => {
            hasher.update(&[1]);
            hasher.update(&(reason.len() as u64).to_le_bytes());
            hasher.update(reason.as_bytes());
        }
        None => {
            hasher.update(&[0]);
        }
    }
    hasher.update(left);
    hasher.update(right);
    *hasher.finalize().as_bytes()
}
