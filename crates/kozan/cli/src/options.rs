//! Grouped CLI options.
//!
//! The clap args are parsed first, then the configuration file if one was
//! given; values merge at the group level with the command line keeping
//! precedence.

use clap::Args;
use kozan_core::config::{
    DEFAULT_BLOCK_INTERVAL, DEFAULT_HOP_DELAY_MS, DEFAULT_MINER_PROBABILITY, DEFAULT_NODE_COUNT,
    DEFAULT_OUTBOUND_PEERS, DEFAULT_PEER_CAPACITY, DEFAULT_PRUNE_WATERMARK,
};
use kozan_primitives::NodeId;
use serde::{Deserialize, Serialize};

use crate::utils::LogFormat;

#[derive(Debug, Args, Clone, Serialize, Deserialize, PartialEq)]
#[command(next_help_heading = "Network options")]
pub struct NetworkOptions {
    /// Number of simulated nodes. Must be even.
    #[arg(long = "net.nodes", value_name = "COUNT")]
    #[arg(default_value_t = DEFAULT_NODE_COUNT)]
    #[serde(default = "default_node_count")]
    pub nodes: usize,

    /// Outbound connections each node attempts during setup.
    #[arg(long = "net.outbound-peers", value_name = "COUNT")]
    #[arg(default_value_t = DEFAULT_OUTBOUND_PEERS)]
    #[serde(default = "default_outbound_peers")]
    pub outbound_peers: usize,

    /// Peer table capacity per node.
    #[arg(long = "net.peer-capacity", value_name = "COUNT")]
    #[arg(default_value_t = DEFAULT_PEER_CAPACITY)]
    #[serde(default = "default_peer_capacity")]
    pub peer_capacity: usize,

    /// One-way delay per unit of peer distance, in milliseconds.
    #[arg(long = "net.hop-delay-ms", value_name = "MILLISECONDS")]
    #[arg(default_value_t = DEFAULT_HOP_DELAY_MS)]
    #[serde(default = "default_hop_delay_ms")]
    pub hop_delay_ms: u64,
}

impl Default for NetworkOptions {
    fn default() -> Self {
        NetworkOptions {
            nodes: DEFAULT_NODE_COUNT,
            outbound_peers: DEFAULT_OUTBOUND_PEERS,
            peer_capacity: DEFAULT_PEER_CAPACITY,
            hop_delay_ms: DEFAULT_HOP_DELAY_MS,
        }
    }
}

impl NetworkOptions {
    pub fn merge(&mut self, other: Option<&Self>) {
        if let Some(other) = other {
            if self.nodes == DEFAULT_NODE_COUNT {
                self.nodes = other.nodes;
            }
            if self.outbound_peers == DEFAULT_OUTBOUND_PEERS {
                self.outbound_peers = other.outbound_peers;
            }
            if self.peer_capacity == DEFAULT_PEER_CAPACITY {
                self.peer_capacity = other.peer_capacity;
            }
            if self.hop_delay_ms == DEFAULT_HOP_DELAY_MS {
                self.hop_delay_ms = other.hop_delay_ms;
            }
        }
    }
}

#[derive(Debug, Args, Clone, Serialize, Deserialize, PartialEq)]
#[command(next_help_heading = "Mining options")]
pub struct MiningOptions {
    /// Mean block solve time, in virtual seconds, for a miner owning the
    /// whole network hashrate.
    #[arg(long = "mining.interval", value_name = "SECONDS")]
    #[arg(default_value_t = DEFAULT_BLOCK_INTERVAL)]
    #[serde(default = "default_block_interval")]
    pub interval: f64,

    /// Probability that a node other than node 0 mines. Node 0 always
    /// mines in this mode.
    #[arg(long = "mining.probability", value_name = "P")]
    #[arg(default_value_t = DEFAULT_MINER_PROBABILITY)]
    #[arg(conflicts_with = "miners")]
    #[serde(default = "default_miner_probability")]
    pub probability: f64,

    /// Mine on exactly these nodes instead of sampling.
    #[arg(long = "mining.miners", value_name = "NODES", value_delimiter = ',')]
    #[serde(default)]
    pub miners: Option<Vec<NodeId>>,
}

impl Default for MiningOptions {
    fn default() -> Self {
        MiningOptions {
            interval: DEFAULT_BLOCK_INTERVAL,
            probability: DEFAULT_MINER_PROBABILITY,
            miners: None,
        }
    }
}

impl MiningOptions {
    pub fn merge(&mut self, other: Option<&Self>) {
        if let Some(other) = other {
            if self.interval == DEFAULT_BLOCK_INTERVAL {
                self.interval = other.interval;
            }
            if self.probability == DEFAULT_MINER_PROBABILITY {
                self.probability = other.probability;
            }
            if self.miners.is_none() {
                self.miners = other.miners.clone();
            }
        }
    }
}

#[derive(Debug, Args, Clone, Serialize, Deserialize, PartialEq)]
#[command(next_help_heading = "Pruning options")]
pub struct PruningOptions {
    /// Arena size above which the driver prunes the chain.
    #[arg(long = "prune.watermark", value_name = "BLOCKS")]
    #[arg(default_value_t = DEFAULT_PRUNE_WATERMARK)]
    #[serde(default = "default_prune_watermark")]
    pub watermark: usize,
}

impl Default for PruningOptions {
    fn default() -> Self {
        PruningOptions { watermark: DEFAULT_PRUNE_WATERMARK }
    }
}

impl PruningOptions {
    pub fn merge(&mut self, other: Option<&Self>) {
        if let Some(other) = other {
            if self.watermark == DEFAULT_PRUNE_WATERMARK {
                self.watermark = other.watermark;
            }
        }
    }
}

#[derive(Debug, Args, Clone, Serialize, Deserialize, Default, PartialEq)]
#[command(next_help_heading = "Logging options")]
pub struct LoggingOptions {
    /// Log format to use.
    #[arg(long = "log.format", value_name = "FORMAT")]
    #[arg(default_value_t = LogFormat::Full)]
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Args, Clone, Serialize, Deserialize, Default, PartialEq)]
#[command(next_help_heading = "Output options")]
pub struct OutputOptions {
    /// Print the run summary as JSON instead of the human-readable table.
    #[arg(long = "output.json")]
    #[serde(default)]
    pub json: bool,
}

// ** Default functions to set up serde of the configuration file **
fn default_node_count() -> usize {
    DEFAULT_NODE_COUNT
}

fn default_outbound_peers() -> usize {
    DEFAULT_OUTBOUND_PEERS
}

fn default_peer_capacity() -> usize {
    DEFAULT_PEER_CAPACITY
}

fn default_hop_delay_ms() -> u64 {
    DEFAULT_HOP_DELAY_MS
}

fn default_block_interval() -> f64 {
    DEFAULT_BLOCK_INTERVAL
}

fn default_miner_probability() -> f64 {
    DEFAULT_MINER_PROBABILITY
}

fn default_prune_watermark() -> usize {
    DEFAULT_PRUNE_WATERMARK
}
