//! Simulation parameters.

use kozan_primitives::NodeId;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::rng::SimRng;

pub const DEFAULT_NODE_COUNT: usize = 1 << 15;
pub const DEFAULT_OUTBOUND_PEERS: usize = 2;
pub const DEFAULT_PEER_CAPACITY: usize = 100;
/// Mean solve time, in virtual seconds, for a miner owning all hashpower.
pub const DEFAULT_BLOCK_INTERVAL: f64 = 300.0;
/// One-way delay per unit of peer distance, in milliseconds.
pub const DEFAULT_HOP_DELAY_MS: u64 = 100;
/// Arena size above which the driver prunes the chain.
pub const DEFAULT_PRUNE_WATERMARK: usize = 1000;
/// Probability that a node other than node 0 is a miner.
pub const DEFAULT_MINER_PROBABILITY: f64 = 1.0 / 3000.0;
/// Safety bound on fired events; normal termination is an empty heap.
pub const DEFAULT_MAX_EVENTS: u64 = 10_000_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Total node count; must be even.
    pub node_count: usize,
    /// Outbound connections each node attempts during setup.
    pub outbound_peers: usize,
    /// Peer table capacity per node.
    pub peer_capacity: usize,
    pub block_interval: f64,
    pub hop_delay_ms: u64,
    pub prune_watermark: usize,
    pub miner_selection: MinerSelection,
    pub rng_seed: u64,
    pub max_events: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            node_count: DEFAULT_NODE_COUNT,
            outbound_peers: DEFAULT_OUTBOUND_PEERS,
            peer_capacity: DEFAULT_PEER_CAPACITY,
            block_interval: DEFAULT_BLOCK_INTERVAL,
            hop_delay_ms: DEFAULT_HOP_DELAY_MS,
            prune_watermark: DEFAULT_PRUNE_WATERMARK,
            miner_selection: MinerSelection::default(),
            rng_seed: 0,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_count == 0 || self.node_count % 2 != 0 {
            return Err(ConfigError::InvalidNodeCount(self.node_count));
        }
        if self.outbound_peers > self.peer_capacity {
            return Err(ConfigError::PeerTableTooSmall {
                outbound: self.outbound_peers,
                capacity: self.peer_capacity,
            });
        }
        if !(self.block_interval > 0.0) {
            return Err(ConfigError::InvalidBlockInterval(self.block_interval));
        }
        if let MinerSelection::Fixed { nodes } = &self.miner_selection {
            if let Some(&bad) = nodes.iter().find(|&&ni| ni >= self.node_count) {
                return Err(ConfigError::MinerOutOfRange { node: bad, count: self.node_count });
            }
        }
        Ok(())
    }

    /// log2 of the node count, rounded down. Bounds the exponent of the
    /// locality-biased peer distance draw, so `1 << k` stays in range for
    /// any admissible node count.
    pub(crate) fn node_shift(&self) -> u32 {
        self.node_count.ilog2()
    }

    pub(crate) fn hop_delay_secs(&self) -> f64 {
        self.hop_delay_ms as f64 / 1000.0
    }
}

/// Which nodes mine. Every selected miner gets hashrate 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MinerSelection {
    /// Node 0 is always a miner; every other node independently with the
    /// given probability.
    Probability { probability: f64 },
    /// Exactly the listed nodes.
    Fixed { nodes: Vec<NodeId> },
}

impl Default for MinerSelection {
    fn default() -> Self {
        Self::Probability { probability: DEFAULT_MINER_PROBABILITY }
    }
}

impl MinerSelection {
    /// Decide whether `ni` mines. Draws once per node in probability mode
    /// (including node 0) to keep the random stream independent of the
    /// outcome.
    pub(crate) fn pick(&self, ni: NodeId, rng: &mut SimRng) -> bool {
        match self {
            Self::Probability { probability } => {
                let drawn = rng.chance(*probability);
                ni == 0 || drawn
            }
            Self::Fixed { nodes } => nodes.contains(&ni),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn odd_node_count_rejected() {
        let config = SimConfig { node_count: 3, ..Default::default() };
        assert_matches!(config.validate(), Err(ConfigError::InvalidNodeCount(3)));
    }

    #[test]
    fn zero_node_count_rejected() {
        let config = SimConfig { node_count: 0, ..Default::default() };
        assert_matches!(config.validate(), Err(ConfigError::InvalidNodeCount(0)));
    }

    #[test]
    fn miner_out_of_range_rejected() {
        let config = SimConfig {
            node_count: 4,
            miner_selection: MinerSelection::Fixed { nodes: vec![0, 9] },
            ..Default::default()
        };
        assert_matches!(
            config.validate(),
            Err(ConfigError::MinerOutOfRange { node: 9, count: 4 })
        );
    }

    #[test]
    fn node_zero_always_mines_by_default() {
        let selection = MinerSelection::default();
        let mut rng = SimRng::seeded(0);
        assert!(selection.pick(0, &mut rng));
    }

    #[test]
    fn fixed_selection_is_exact() {
        let selection = MinerSelection::Fixed { nodes: vec![1, 3] };
        let mut rng = SimRng::seeded(0);
        assert!(!selection.pick(0, &mut rng));
        assert!(selection.pick(1, &mut rng));
        assert!(!selection.pick(2, &mut rng));
        assert!(selection.pick(3, &mut rng));
    }
}
