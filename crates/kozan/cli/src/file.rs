use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::options::*;

/// Simulator arguments configuration file.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct SimArgsConfig {
    pub seed: Option<u64>,
    pub max_events: Option<u64>,
    pub network: Option<NetworkOptions>,
    pub mining: Option<MiningOptions>,
    pub pruning: Option<PruningOptions>,
    pub logging: Option<LoggingOptions>,
    pub output: Option<OutputOptions>,
}

impl SimArgsConfig {
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&file)?)
    }
}
