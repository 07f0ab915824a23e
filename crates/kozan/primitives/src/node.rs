use serde::{Deserialize, Serialize};

/// Index of a node in the simulated network.
pub type NodeId = usize;

/// Relative mining power of a node. Zero marks a non-miner.
pub type Hashrate = f64;

/// One entry in a node's peer table.
///
/// The peer graph is undirected: whenever node A carries `Peer { node: B,
/// delay }`, node B carries a matching entry pointing back at A with the
/// same delay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peer {
    pub node: NodeId,
    /// One-way message delay to this peer, in virtual seconds.
    pub delay: f64,
}
