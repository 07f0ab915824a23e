//! End-of-run accounting.

use kozan_primitives::{BlockNumber, Hashrate, NodeId, SimTime};
use serde::{Deserialize, Serialize};

/// Statistics gathered over a run. Credits only accrue on pruning, so
/// `credit` totals lag `mined` totals by the depth of the unpruned chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    /// Final virtual time, in seconds.
    pub elapsed: SimTime,
    /// Events fired by the driver loop.
    pub events_fired: u64,
    /// Deepest reorganization any miner underwent.
    pub max_reorg: u64,
    /// Height of the current arena base (stable prefix of the chain).
    pub base_height: BlockNumber,
    /// Blocks still in the arena.
    pub blocks_live: usize,
    pub miners: Vec<MinerSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinerSummary {
    pub node: NodeId,
    pub hashrate: Hashrate,
    /// Blocks this miner found.
    pub mined: u64,
    /// Blocks this miner has been credited for on the pruned stable chain.
    pub credit: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_round_trips_through_json() {
        let summary = SimulationSummary {
            elapsed: 123.5,
            events_fired: 42,
            max_reorg: 3,
            base_height: 10,
            blocks_live: 5,
            miners: vec![MinerSummary { node: 0, hashrate: 1.0, mined: 7, credit: 6 }],
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: SimulationSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }
}
