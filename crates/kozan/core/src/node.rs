//! Per-node behavior.
//!
//! Every node is a long-lived cooperative task. On its first run it wires
//! itself into the overlay and, if it mines, starts its first solve; after
//! that it loops forever on its input queue, reacting to mining
//! completions and peer deliveries. The resume point between runs is the
//! explicit [`NodeState`] kept on the node record.

use kozan_primitives::block::NO_PARENT;
use kozan_primitives::{BlockId, Hashrate, NodeId, Peer};
use tracing::{debug, trace};

use crate::backend::Backend;
use crate::events::{EventId, EventKind, NO_EVENT};
use crate::sched::{Step, TaskId, Turn, WaitChannel};

/// Channel a node sleeps on while its input queue is empty.
///
/// Raw identities are spread 32 apart per node so the `>> 4` bucket hash
/// sends distinct nodes to distinct buckets.
pub(crate) fn input_channel(ni: NodeId) -> WaitChannel {
    WaitChannel::new((ni as u64) << 5)
}

/// Channel a node's delay timer signals on expiry.
pub(crate) fn delay_channel(ni: NodeId) -> WaitChannel {
    WaitChannel::new(((ni as u64) << 5) | 0x10)
}

/// Resume point of a node task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    /// First run: build the peer table, start mining.
    Connect,
    /// Steady state: consume input events as they arrive.
    Recv,
}

#[derive(Debug)]
pub struct Node {
    pub ni: NodeId,
    /// Zero for non-miners.
    pub hashrate: Hashrate,
    /// Scheduler handle, set when the simulation spawns the task.
    pub task: Option<TaskId>,
    /// Block this node currently mines on / considers best.
    pub tip: BlockId,
    /// Head (newest) of the input event queue; [`NO_EVENT`] when empty.
    pub(crate) qhead: EventId,
    /// Outstanding delay timer, if the node is sleeping on one.
    pub(crate) delay_event: EventId,
    /// Blocks found.
    pub mined: u64,
    /// Blocks credited on the pruned stable chain.
    pub credit: u64,
    pub peers: Vec<Peer>,
    pub(crate) state: NodeState,
}

impl Node {
    pub(crate) fn new(ni: NodeId, hashrate: Hashrate) -> Self {
        Self {
            ni,
            hashrate,
            task: None,
            // Not a valid block id; replaced with the chain base on setup.
            tip: NO_PARENT,
            qhead: NO_EVENT,
            delay_event: NO_EVENT,
            mined: 0,
            credit: 0,
            peers: Vec::new(),
            state: NodeState::Connect,
        }
    }
}

/// Task entry for every node; `data` carries the node index.
pub(crate) fn node_entry(backend: &mut Backend, _task: TaskId, data: u64) -> Turn {
    backend.run_node(data as NodeId)
}

impl Backend {
    fn run_node(&mut self, ni: NodeId) -> Turn {
        if self.nodes[ni].state == NodeState::Connect {
            self.connect_peers(ni);
            self.total_hashrate += self.nodes[ni].hashrate;
            self.nodes[ni].tip = self.chain.base();
            if self.is_miner(ni) {
                self.start_mining(ni);
            }
            self.nodes[ni].state = NodeState::Recv;
        }

        loop {
            if self.nodes[ni].qhead == NO_EVENT {
                return Turn::Wait(input_channel(ni));
            }
            let e = self.pop_input(ni);
            self.receive(ni, e);
        }
    }

    /// Attempt `outbound_peers` connections with a locality-biased distance
    /// draw: `d = 1 + randrange(2^k)` for `k = randrange(node_shift + 1)`.
    /// Both endpoints get matching entries; collisions and full tables just
    /// forfeit the attempt.
    fn connect_peers(&mut self, ni: NodeId) {
        let n = self.config.node_count;
        let shift = self.config.node_shift() as u64;
        for _ in 0..self.config.outbound_peers {
            let k = self.rng.randrange(shift + 1);
            let d = 1 + self.rng.randrange(1u64 << k);
            let pi = (ni + d as usize) % n;
            if pi == ni || self.nodes[ni].peers.iter().any(|p| p.node == pi) {
                continue;
            }
            if self.nodes[ni].peers.len() >= self.config.peer_capacity
                || self.nodes[pi].peers.len() >= self.config.peer_capacity
            {
                continue;
            }
            let delay = d as f64 * self.config.hop_delay_secs();
            self.nodes[ni].peers.push(Peer { node: pi, delay });
            self.nodes[pi].peers.push(Peer { node: ni, delay });
            trace!(target: "node", node = ni, peer = pi, delay, "peered");
        }
    }

    /// Consume one input event. The event is freed here; its payload has
    /// been copied out first.
    fn receive(&mut self, ni: NodeId, e: EventId) {
        let kind = self.events.get(e).kind;
        self.events.free(e);

        match kind {
            EventKind::Delay { .. } => {
                unreachable!("delay events are signaled, never queued")
            }
            EventKind::NewBlock { mining: true, block, .. } => {
                if block != self.nodes[ni].tip {
                    // A better chain arrived after this solve was
                    // scheduled; the work is wasted.
                    trace!(target: "miner", node = ni, block, "stale solve discarded");
                    return;
                }
                self.nodes[ni].mined += 1;
                self.stop_mining(ni);
                let height = self.chain.height(block) + 1;
                let new_block = self.chain.alloc(block, height, ni);
                debug!(target: "miner", node = ni, block = new_block, height, "block found");
                self.switch_tip(ni, new_block);
            }
            EventKind::NewBlock { mining: false, block, .. } => {
                if !self.chain.is_valid(block) {
                    trace!(target: "node", node = ni, block, "pruned block discarded");
                    return;
                }
                let tip = self.nodes[ni].tip;
                // A tip that fell below the arena base has unknowable
                // height; any valid delivery beats it.
                if self.chain.is_valid(tip)
                    && self.chain.height(block) <= self.chain.height(tip)
                {
                    trace!(target: "node", node = ni, block, "not better than tip");
                    return;
                }
                if self.is_miner(ni) {
                    let depth = self.reorg_depth(block, tip);
                    if depth > self.max_reorg {
                        debug!(target: "node", node = ni, depth, "deepest reorg so far");
                        self.max_reorg = depth;
                    }
                    self.stop_mining(ni);
                }
                self.switch_tip(ni, block);
            }
        }
    }

    /// Adopt `block` as the new tip, announce it, and resume mining on it.
    fn switch_tip(&mut self, ni: NodeId, block: BlockId) {
        self.nodes[ni].tip = block;
        self.relay(ni);
        if self.is_miner(ni) {
            self.start_mining(ni);
        }
    }

    /// Blocks between the old tip and its closest common ancestor with the
    /// strictly-better block being adopted.
    fn reorg_depth(&self, better: BlockId, tip: BlockId) -> u64 {
        let mut t = better;
        let mut c = tip;
        while self.chain.height(t) > self.chain.height(c) {
            t = self.chain.parent(t);
        }
        let mut depth = 0;
        while t != c {
            t = self.chain.parent(t);
            c = self.chain.parent(c);
            depth += 1;
        }
        depth
    }

    /// Begin a solve on the current tip and schedule its completion. The
    /// solve time is exponential with mean scaled by this miner's share of
    /// the total hashrate.
    pub(crate) fn start_mining(&mut self, ni: NodeId) {
        let tip = self.nodes[ni].tip;
        let block = self.chain.get_mut(tip);
        block.active += 1;
        if block.active == 1 {
            self.ntips += 1;
        }
        let mean =
            self.config.block_interval * self.total_hashrate / self.nodes[ni].hashrate;
        let solve = self.rng.poisson(mean);
        let e = self.events.alloc(EventKind::NewBlock { node: ni, mining: true, block: tip });
        self.events.post(e, self.time + solve);
        trace!(target: "miner", node = ni, tip, at = self.time + solve, "solve scheduled");
    }

    pub(crate) fn stop_mining(&mut self, ni: NodeId) {
        let tip = self.nodes[ni].tip;
        let block = self.chain.get_mut(tip);
        block.active -= 1;
        if block.active == 0 {
            self.ntips -= 1;
        }
    }

    /// Announce our tip to every peer that does not already know a chain
    /// at least as high. Deliveries back to whoever sent us the block are
    /// not filtered; the receiver discards them as stale.
    fn relay(&mut self, ni: NodeId) {
        let tip = self.nodes[ni].tip;
        let height = self.chain.height(tip);
        for i in 0..self.nodes[ni].peers.len() {
            let Peer { node: pi, delay } = self.nodes[ni].peers[i];
            let peer_tip = self.nodes[pi].tip;
            if self.chain.is_valid(peer_tip) && self.chain.height(peer_tip) >= height {
                continue;
            }
            let e = self.events.alloc(EventKind::NewBlock { node: pi, mining: false, block: tip });
            self.events.post(e, self.time + delay);
            trace!(target: "node", node = ni, peer = pi, block = tip, "relayed");
        }
    }

    /// Nested coroutine frame: sleep for `t` virtual seconds. The first
    /// call arms the timer; later calls poll it. Returns
    /// [`Step::Pending`] with the channel to wait on until the timer has
    /// fired, then frees the event and completes.
    pub(crate) fn delay(&mut self, ni: NodeId, t: f64) -> Step<()> {
        if self.nodes[ni].delay_event == NO_EVENT {
            let e = self.events.alloc(EventKind::Delay { node: ni });
            self.events.post(e, self.time + t);
            self.nodes[ni].delay_event = e;
        }
        let e = self.nodes[ni].delay_event;
        if self.events.is_pending(e, self.time) {
            Step::Pending(delay_channel(ni))
        } else {
            self.events.free(e);
            self.nodes[ni].delay_event = NO_EVENT;
            Step::Complete(())
        }
    }
}
