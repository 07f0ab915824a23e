//! Chain pruning: advance the stable base to the oldest common ancestor of
//! all miner tips, credit the miners of the blocks that become final, and
//! compact the arena.

use tracing::debug;

use crate::backend::Backend;

impl Backend {
    /// Prune everything below the oldest common ancestor of the miners'
    /// tips. A no-op without miners or when the common ancestor is already
    /// the base. Heights are absolute, so lookups on surviving ids are
    /// unaffected.
    pub fn prune(&mut self) {
        if self.miners.is_empty() {
            return;
        }

        let mut tips: Vec<_> = self.miners.iter().map(|&ni| self.nodes[ni].tip).collect();

        // Level every tip down to the lowest tip height, then walk all of
        // them back in lockstep until they agree.
        let min_height = tips.iter().map(|&t| self.chain.height(t)).min().expect("has miners");
        for t in tips.iter_mut() {
            while self.chain.height(*t) > min_height {
                *t = self.chain.parent(*t);
            }
        }
        while tips.iter().any(|&t| t != tips[0]) {
            for t in tips.iter_mut() {
                *t = self.chain.parent(*t);
            }
        }

        let new_base = tips[0];
        let old_base = self.chain.base();
        if new_base == old_base {
            return;
        }

        // Everything from the new base down to (excluding) the old base is
        // final now; credit the miners that built it.
        let mut b = new_base;
        while b != old_base {
            let block = self.chain.get(b);
            if let Some(m) = block.miner {
                self.nodes[m].credit += 1;
            }
            b = block.parent;
        }

        debug!(
            target: "prune",
            base = new_base,
            height = self.chain.height(new_base),
            finalized = new_base - old_base,
            "pruned"
        );
        self.chain.compact(new_base);
    }
}
