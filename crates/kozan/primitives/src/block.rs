use serde::{Deserialize, Serialize};

use crate::node::NodeId;

/// Monotonically assigned block identifier.
///
/// Ids start from a non-zero base and index into the block arena as
/// `id - base`; id 0 is reserved as the "no parent" marker of genesis.
pub type BlockId = u64;

/// Absolute chain height of a block. Genesis is at height 0.
pub type BlockNumber = u64;

/// The parent id carried by the genesis block. Never a valid [`BlockId`].
pub const NO_PARENT: BlockId = 0;

/// A simulated block.
///
/// There is no payload: the only properties the simulation cares about are
/// where a block sits in the tree and who found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Id of the parent block; [`NO_PARENT`] for genesis.
    pub parent: BlockId,
    /// Absolute height; `parent.height + 1` for every non-genesis block.
    pub height: BlockNumber,
    /// The node that mined this block, if any.
    pub miner: Option<NodeId>,
    /// Number of miners currently mining directly on top of this block.
    pub active: u32,
}

impl Block {
    /// The genesis block: no parent, height 0, no miner.
    pub fn genesis() -> Self {
        Self { parent: NO_PARENT, height: 0, miner: None, active: 0 }
    }

    pub fn is_genesis(&self) -> bool {
        self.parent == NO_PARENT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_shape() {
        let genesis = Block::genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.height, 0);
        assert_eq!(genesis.miner, None);
        assert_eq!(genesis.active, 0);
    }
}
