#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("node count must be non-zero and even, got {0}")]
    InvalidNodeCount(usize),

    #[error("outbound peer target {outbound} exceeds peer table capacity {capacity}")]
    PeerTableTooSmall { outbound: usize, capacity: usize },

    #[error("block interval must be positive, got {0}")]
    InvalidBlockInterval(f64),

    #[error("miner index {node} out of range for {count} nodes")]
    MinerOutOfRange { node: usize, count: usize },
}
