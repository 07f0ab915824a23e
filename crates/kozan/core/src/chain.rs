//! Block arena and chain lookups.
//!
//! Blocks are stored in a flat arena indexed by `id - base`, where ids are
//! assigned monotonically starting from a non-zero base. Pruning advances
//! the base and compacts the arena; heights are absolute and survive
//! compaction unchanged.

use kozan_primitives::{Block, BlockId, BlockNumber, NodeId};
use tracing::trace;

/// Id assigned to the genesis block. Arbitrary, but non-zero so that the
/// genesis parent id (0) is never a valid block id.
pub const GENESIS_BLOCK_ID: BlockId = 1000;

#[derive(Debug)]
pub struct Blockchain {
    blocks: Vec<Block>,
    /// Id of the block at arena index 0.
    base: BlockId,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// A chain holding only the genesis block.
    pub fn new() -> Self {
        Self { blocks: vec![Block::genesis()], base: GENESIS_BLOCK_ID }
    }

    /// Id of the oldest block still in the arena.
    pub fn base(&self) -> BlockId {
        self.base
    }

    /// Number of blocks in the arena.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        false // genesis is never removed
    }

    /// Id of the most recently allocated block.
    pub fn newest(&self) -> BlockId {
        self.base + self.blocks.len() as BlockId - 1
    }

    /// Append a block mined by `miner` on top of `parent`. Returns its id.
    pub fn alloc(&mut self, parent: BlockId, height: BlockNumber, miner: NodeId) -> BlockId {
        debug_assert!(self.is_valid(parent));
        debug_assert_eq!(height, self.height(parent) + 1);
        self.blocks.push(Block { parent, height, miner: Some(miner), active: 0 });
        self.newest()
    }

    /// Whether `id` refers to a block still in the arena.
    pub fn is_valid(&self, id: BlockId) -> bool {
        id >= self.base && id < self.base + self.blocks.len() as BlockId
    }

    /// Panics if `id` is not a valid block id.
    pub fn get(&self, id: BlockId) -> &Block {
        assert!(self.is_valid(id), "block id {id} outside [{}, {})", self.base, self.newest() + 1);
        &self.blocks[(id - self.base) as usize]
    }

    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        assert!(self.is_valid(id), "block id {id} outside [{}, {})", self.base, self.newest() + 1);
        &mut self.blocks[(id - self.base) as usize]
    }

    pub fn height(&self, id: BlockId) -> BlockNumber {
        self.get(id).height
    }

    pub fn parent(&self, id: BlockId) -> BlockId {
        self.get(id).parent
    }

    /// Iterate over the ids of all blocks currently in the arena.
    pub fn ids(&self) -> impl Iterator<Item = BlockId> {
        self.base..self.base + self.blocks.len() as BlockId
    }

    /// Drop every block below `new_base` and make it the new arena base.
    /// Capacity shrinks to the smallest power of two that still holds the
    /// survivors.
    pub fn compact(&mut self, new_base: BlockId) {
        assert!(self.is_valid(new_base));
        let dropped = (new_base - self.base) as usize;
        if dropped == 0 {
            return;
        }
        self.blocks.drain(..dropped);
        self.base = new_base;
        self.blocks.shrink_to(self.blocks.len().next_power_of_two());
        trace!(target: "prune", base = new_base, dropped, live = self.blocks.len(), "arena compacted");
    }
}
