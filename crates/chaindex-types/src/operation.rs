use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::hash::FactHash;

/// A submitted operation as it appears in a finalized block.
///
/// The fact is kept as opaque JSON; its hash is derived from the canonical
/// encoding (object keys sorted) so the same fact always yields the same
/// [`FactHash`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "OperationRepr")]
pub struct Operation {
    /// Type hint of the operation, e.g. `mitum-nft-mint-operation-v0.0.1`.
    pub hint: String,
    fact: Value,
    fact_hash: FactHash,
}

impl Operation {
    /// Create an operation, deriving its fact hash.
    pub fn new(hint: impl Into<String>, fact: Value) -> Self {
        let fact_hash = fact_hash_of(&fact);
        Self {
            hint: hint.into(),
            fact,
            fact_hash,
        }
    }

    pub fn fact(&self) -> &Value {
        &self.fact
    }

    /// The fact identity used to look the operation up in the operations tree.
    pub fn fact_hash(&self) -> FactHash {
        self.fact_hash
    }
}

fn fact_hash_of(fact: &Value) -> FactHash {
    // serde_json maps are BTreeMap-backed, so this encoding is canonical.
    FactHash::from_bytes(fact.to_string().as_bytes())
}

#[derive(Deserialize)]
struct OperationRepr {
    hint: String,
    fact: Value,
    #[serde(default)]
    fact_hash: Option<FactHash>,
}

impl TryFrom<OperationRepr> for Operation {
    type Error = TypeError;

    fn try_from(repr: OperationRepr) -> Result<Self, Self::Error> {
        let op = Operation::new(repr.hint, repr.fact);
        match repr.fact_hash {
            Some(declared) if declared != op.fact_hash => Err(TypeError::Serialization(format!(
                "declared fact hash {declared} does not match computed {}",
                op.fact_hash
            ))),
            _ => Ok(op),
        }
    }
}
