//! Operation documents.

use chaindex_store::{Document, WriteModel};
use chaindex_types::{Block, FactHash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DigestError, DigestResult};
use crate::tree_index::OperationsTreeIndex;

/// Stored projection of one operation.
///
/// `index` is the operation's zero-based position in the block, so readers
/// can rebuild in-block order with a range query on `(height, index)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OperationDoc {
    pub fact_hash: FactHash,
    pub hint: String,
    pub operation: Value,
    pub height: u64,
    pub confirmed_at: DateTime<Utc>,
    pub in_state: bool,
    pub reason: Option<String>,
    pub index: u64,
}

/// Build one insert per operation, in block order.
///
/// An operation without a tree node fails with [`DigestError::NotFound`].
pub fn build_operation_models(
    block: &Block,
    tree: &OperationsTreeIndex,
) -> DigestResult<Vec<WriteModel>> {
    let mut models = Vec::with_capacity(block.operations().len());

    for (i, op) in block.operations().iter().enumerate() {
        let fact = op.fact_hash();
        let node = tree
            .lookup(&fact)
            .ok_or(DigestError::NotFound { fact })?;

        let doc = OperationDoc {
            fact_hash: fact,
            hint: op.hint.clone(),
            operation: op.fact().clone(),
            height: block.height().get(),
            confirmed_at: block.confirmed_at(),
            in_state: node.in_state,
            reason: node.reason.clone(),
            index: i as u64,
        };
        let document = Document::encode(&doc)
            .map_err(|e| DigestError::validation(format!("operation {fact}"), e))?;
        models.push(WriteModel::insert(document));
    }

    Ok(models)
}

#[cfg(test)]
mod tests {
    use chaindex_types::{Height, Operation, OperationOutcome, OperationsTree};
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn ops(n: usize) -> Vec<Operation> {
        (0..n)
            .map(|i| Operation::new("transfer", json!({"seq": i})))
            .collect()
    }

    fn block(ops: Vec<Operation>, outcomes: &[OperationOutcome]) -> Block {
        Block::new(
            Height(10),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ops,
            vec![],
            OperationsTree::from_outcomes(outcomes),
        )
    }

    fn decode(models: &[WriteModel]) -> Vec<OperationDoc> {
        models
            .iter()
            .map(|m| match m {
                WriteModel::InsertOne(doc) => doc.decode().unwrap(),
            })
            .collect()
    }

    #[test]
    fn documents_follow_block_order() {
        let ops = ops(3);
        let outcomes = [
            OperationOutcome::applied(ops[0].fact_hash()),
            OperationOutcome::applied(ops[1].fact_hash()),
            OperationOutcome::rejected(ops[2].fact_hash(), "insufficient balance"),
        ];
        let blk = block(ops.clone(), &outcomes);
        let index = OperationsTreeIndex::build(blk.operations_tree()).unwrap();

        let docs = decode(&build_operation_models(&blk, &index).unwrap());
        assert_eq!(docs.len(), 3);
        for (i, doc) in docs.iter().enumerate() {
            assert_eq!(doc.index, i as u64);
            assert_eq!(doc.fact_hash, ops[i].fact_hash());
            assert_eq!(doc.height, 10);
        }
        assert!(docs[0].in_state && docs[1].in_state);
        assert!(!docs[2].in_state);
        assert_eq!(docs[2].reason.as_deref(), Some("insufficient balance"));
    }

    #[test]
    fn tree_order_does_not_matter() {
        let ops = ops(2);
        let outcomes = [
            OperationOutcome::applied(ops[1].fact_hash()),
            OperationOutcome::applied(ops[0].fact_hash()),
        ];
        let blk = block(ops.clone(), &outcomes);
        let index = OperationsTreeIndex::build(blk.operations_tree()).unwrap();
        let docs = decode(&build_operation_models(&blk, &index).unwrap());
        assert_eq!(docs[0].fact_hash, ops[0].fact_hash());
        assert_eq!(docs[0].index, 0);
    }

    #[test]
    fn missing_tree_node_is_not_found() {
        let ops = ops(2);
        let outcomes = [OperationOutcome::applied(ops[0].fact_hash())];
        let blk = block(ops.clone(), &outcomes);
        let index = OperationsTreeIndex::build(blk.operations_tree()).unwrap();

        match build_operation_models(&blk, &index) {
            Err(DigestError::NotFound { fact }) => assert_eq!(fact, ops[1].fact_hash()),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_block_builds_nothing() {
        let blk = block(vec![], &[]);
        let index = OperationsTreeIndex::build(blk.operations_tree()).unwrap();
        assert!(build_operation_models(&blk, &index).unwrap().is_empty());
    }
}
