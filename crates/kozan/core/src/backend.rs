//! The simulation world: chain, event queue, nodes, and global counters.
//!
//! All state lives behind one value owned by the driver; node tasks run
//! against it through `&mut` and refer to blocks, events and each other by
//! index only.

use kozan_primitives::{NodeId, SimTime};

use crate::chain::Blockchain;
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::events::{EventId, EventQueue, NO_EVENT};
use crate::node::Node;
use crate::rng::SimRng;
use crate::stats::{MinerSummary, SimulationSummary};

pub struct Backend {
    pub config: SimConfig,
    pub(crate) rng: SimRng,
    /// Current virtual time; advanced only by the driver.
    pub time: SimTime,
    pub events: EventQueue,
    pub chain: Blockchain,
    pub nodes: Vec<Node>,
    /// Sum of all hashrates of nodes that completed setup.
    pub total_hashrate: f64,
    /// Number of distinct blocks some miner is currently mining on.
    pub ntips: usize,
    /// Deepest reorganization observed so far. Non-decreasing.
    pub max_reorg: u64,
    /// Indices of the mining nodes, ascending.
    pub miners: Vec<NodeId>,
}

impl Backend {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut rng = SimRng::seeded(config.rng_seed);
        let mut nodes = Vec::with_capacity(config.node_count);
        let mut miners = Vec::new();
        for ni in 0..config.node_count {
            let mining = config.miner_selection.pick(ni, &mut rng);
            if mining {
                miners.push(ni);
            }
            nodes.push(Node::new(ni, if mining { 1.0 } else { 0.0 }));
        }

        Ok(Self {
            config,
            rng,
            time: 0.0,
            events: EventQueue::new(),
            chain: Blockchain::new(),
            nodes,
            total_hashrate: 0.0,
            ntips: 0,
            max_reorg: 0,
            miners,
        })
    }

    pub fn is_miner(&self, ni: NodeId) -> bool {
        self.nodes[ni].hashrate > 0.0
    }

    /// Append `e` to the tail of `ni`'s input queue. The queue is a
    /// circular list threaded through event `next` links, head = newest.
    pub(crate) fn push_input(&mut self, ni: NodeId, e: EventId) {
        let qhead = self.nodes[ni].qhead;
        if qhead == NO_EVENT {
            self.events.set_next(e, e);
        } else {
            let oldest = self.events.next(qhead);
            self.events.set_next(e, oldest);
            self.events.set_next(qhead, e);
        }
        self.nodes[ni].qhead = e;
    }

    /// Unlink and return the oldest queued input event. The queue must be
    /// non-empty; the caller owns (and eventually frees) the event.
    pub(crate) fn pop_input(&mut self, ni: NodeId) -> EventId {
        let qhead = self.nodes[ni].qhead;
        debug_assert_ne!(qhead, NO_EVENT, "input queue underflow on node {ni}");
        let oldest = self.events.next(qhead);
        if oldest == qhead {
            self.nodes[ni].qhead = NO_EVENT;
        } else {
            let next = self.events.next(oldest);
            self.events.set_next(qhead, next);
        }
        self.events.set_next(oldest, NO_EVENT);
        oldest
    }

    pub fn summary(&self, events_fired: u64) -> SimulationSummary {
        SimulationSummary {
            elapsed: self.time,
            events_fired,
            max_reorg: self.max_reorg,
            base_height: self.chain.height(self.chain.base()),
            blocks_live: self.chain.len(),
            miners: self
                .miners
                .iter()
                .map(|&ni| {
                    let node = &self.nodes[ni];
                    MinerSummary {
                        node: ni,
                        hashrate: node.hashrate,
                        mined: node.mined,
                        credit: node.credit,
                    }
                })
                .collect(),
        }
    }
}
