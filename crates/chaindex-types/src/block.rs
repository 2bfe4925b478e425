use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::Operation;
use crate::state::StateEntry;
use crate::tree::OperationsTree;

/// Block height.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Height(pub u64);

impl Height {
    pub const fn new(h: u64) -> Self {
        Self(h)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Height {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Height {
    fn from(h: u64) -> Self {
        Self(h)
    }
}

/// A finalized block, as handed over by the consensus layer.
///
/// Immutable once built. The digester never mutates a block; sessions share
/// it behind an `Arc`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    height: Height,
    confirmed_at: DateTime<Utc>,
    operations: Vec<Operation>,
    states: Vec<StateEntry>,
    operations_tree: OperationsTree,
}

impl Block {
    pub fn new(
        height: Height,
        confirmed_at: DateTime<Utc>,
        operations: Vec<Operation>,
        states: Vec<StateEntry>,
        operations_tree: OperationsTree,
    ) -> Self {
        Self {
            height,
            confirmed_at,
            operations,
            states,
            operations_tree,
        }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn confirmed_at(&self) -> DateTime<Utc> {
        self.confirmed_at
    }

    /// Operations in block order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn states(&self) -> &[StateEntry] {
        &self.states
    }

    pub fn operations_tree(&self) -> &OperationsTree {
        &self.operations_tree
    }
}
