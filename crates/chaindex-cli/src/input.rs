//! Block files read by `chaindex digest`.

use std::path::Path;

use anyhow::{bail, Context};
use chaindex_types::{Block, Height, Operation, OperationOutcome, OperationsTree, StateEntry};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// On-disk block. Carries either a built `operations_tree` or the raw
/// `outcomes` to build one from; with neither, every operation is applied.
#[derive(Debug, Deserialize)]
struct BlockFile {
    height: Height,
    confirmed_at: DateTime<Utc>,
    #[serde(default)]
    operations: Vec<Operation>,
    #[serde(default)]
    states: Vec<StateEntry>,
    #[serde(default)]
    outcomes: Option<Vec<OperationOutcome>>,
    #[serde(default)]
    operations_tree: Option<OperationsTree>,
}

impl BlockFile {
    fn into_block(self) -> anyhow::Result<Block> {
        let tree = match (self.operations_tree, self.outcomes) {
            (Some(_), Some(_)) => bail!("block has both operations_tree and outcomes"),
            (Some(tree), None) => tree,
            (None, Some(outcomes)) => OperationsTree::from_outcomes(&outcomes),
            (None, None) => {
                let outcomes: Vec<_> = self
                    .operations
                    .iter()
                    .map(|op| OperationOutcome::applied(op.fact_hash()))
                    .collect();
                OperationsTree::from_outcomes(&outcomes)
            }
        };
        Ok(Block::new(
            self.height,
            self.confirmed_at,
            self.operations,
            self.states,
            tree,
        ))
    }
}

pub fn parse_block(raw: &str) -> anyhow::Result<Block> {
    let file: BlockFile = serde_json::from_str(raw)?;
    file.into_block()
}

pub fn read_block(path: &Path) -> anyhow::Result<Block> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_block(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = r#"{
        "height": 3,
        "confirmed_at": "2024-05-01T12:00:00Z",
        "operations": [{"hint": "transfer", "fact": {"to": "bob"}}],
        "states": [
            {"key": "alice:account", "value": {"keys": {"threshold": 1, "keys": [{"key": "pk", "weight": 1}]}}, "height": 3}
        ]
    }"#;

    #[test]
    fn operations_default_to_applied() {
        let block = parse_block(MINIMAL).unwrap();
        assert_eq!(block.height(), Height(3));
        assert_eq!(block.operations_tree().len(), 1);
        let node = block.operations_tree().get(0).unwrap();
        assert!(node.in_state);
        assert_eq!(node.key, block.operations()[0].fact_hash());
    }

    #[test]
    fn explicit_outcomes_build_the_tree() {
        let op = Operation::new("transfer", serde_json::json!({"to": "bob"}));
        let raw = serde_json::json!({
            "height": 4,
            "confirmed_at": "2024-05-01T12:00:00Z",
            "operations": [op],
            "outcomes": [{"fact": op.fact_hash(), "in_state": false, "reason": "no funds"}]
        })
        .to_string();
        let block = parse_block(&raw).unwrap();
        let node = block.operations_tree().get(0).unwrap();
        assert!(!node.in_state);
        assert_eq!(node.reason.as_deref(), Some("no funds"));
    }

    #[test]
    fn tree_and_outcomes_together_are_rejected() {
        let raw = r#"{"height": 1, "confirmed_at": "2024-05-01T12:00:00Z",
                      "outcomes": [], "operations_tree": []}"#;
        assert!(parse_block(raw).is_err());
    }

    #[test]
    fn read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        assert_eq!(read_block(file.path()).unwrap().states().len(), 1);
    }
}
