//! Kozan simulator CLI options and configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kozan_core::config::DEFAULT_MAX_EVENTS;
use kozan_core::{MinerSelection, SimConfig, Simulation};
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_log::LogTracer;
use tracing_subscriber::{fmt, EnvFilter};

use crate::file::SimArgsConfig;
use crate::options::*;
use crate::utils;
use crate::utils::LogFormat;

pub(crate) const LOG_TARGET: &str = "kozan::cli";

#[derive(Parser, Debug, Serialize, Deserialize, Clone, PartialEq)]
#[command(name = "kozan")]
#[command(about = "Discrete-event simulator of a proof-of-work peer-to-peer network")]
#[command(next_help_heading = "Simulator options")]
pub struct SimArgs {
    /// Seed for the deterministic random stream. Identical seeds and
    /// configurations replay identical runs.
    #[arg(long, default_value_t = 0)]
    #[serde(default)]
    pub seed: u64,

    /// Safety cap on fired events. The run normally ends when the event
    /// heap empties.
    #[arg(long, value_name = "COUNT")]
    #[arg(default_value_t = DEFAULT_MAX_EVENTS)]
    #[serde(default = "default_max_events")]
    pub max_events: u64,

    /// Configuration file.
    #[arg(long, value_name = "PATH")]
    #[serde(skip)]
    config: Option<PathBuf>,

    #[command(flatten)]
    pub network: NetworkOptions,

    #[command(flatten)]
    pub mining: MiningOptions,

    #[command(flatten)]
    pub pruning: PruningOptions,

    #[command(flatten)]
    pub logging: LoggingOptions,

    #[command(flatten)]
    pub output: OutputOptions,
}

impl SimArgs {
    pub fn execute(&self) -> Result<()> {
        self.init_logging()?;

        let config = self.sim_config()?;
        info!(
            target: LOG_TARGET,
            nodes = config.node_count,
            seed = config.rng_seed,
            "starting simulation"
        );

        let mut sim = Simulation::new(config).context("failed to build the simulation")?;
        sim.run();

        let summary = sim.summary();
        if self.output.json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            utils::print_summary(&summary);
        }

        Ok(())
    }

    fn init_logging(&self) -> Result<()> {
        const DEFAULT_LOG_FILTER: &str = "info,events=warn,sched=warn";

        LogTracer::init()?;

        // `RUST_LOG` takes precedence over the default filter.
        let filter = EnvFilter::try_from_default_env().or(EnvFilter::try_new(DEFAULT_LOG_FILTER))?;
        let builder = fmt::Subscriber::builder().with_env_filter(filter);

        let subscriber: Box<dyn Subscriber + Send + Sync> = match self.logging.log_format {
            LogFormat::Full => Box::new(builder.finish()),
            LogFormat::Json => Box::new(builder.json().finish()),
        };

        Ok(tracing::subscriber::set_global_default(subscriber)?)
    }

    pub fn sim_config(&self) -> Result<SimConfig> {
        let miner_selection = match &self.mining.miners {
            Some(nodes) => MinerSelection::Fixed { nodes: nodes.clone() },
            None => MinerSelection::Probability { probability: self.mining.probability },
        };

        let config = SimConfig {
            node_count: self.network.nodes,
            outbound_peers: self.network.outbound_peers,
            peer_capacity: self.network.peer_capacity,
            block_interval: self.mining.interval,
            hop_delay_ms: self.network.hop_delay_ms,
            prune_watermark: self.pruning.watermark,
            miner_selection,
            rng_seed: self.seed,
            max_events: self.max_events,
        };
        config.validate().context("invalid simulation configuration")?;
        Ok(config)
    }

    /// Merge the configuration file beneath the command-line arguments.
    /// The command line keeps precedence; the merge is made at the group
    /// level.
    pub fn with_config_file(mut self) -> Result<Self> {
        let config = if let Some(path) = &self.config {
            SimArgsConfig::read(path)?
        } else {
            return Ok(self);
        };

        if self.seed == 0 {
            self.seed = config.seed.unwrap_or_default();
        }

        if self.max_events == DEFAULT_MAX_EVENTS {
            if let Some(max_events) = config.max_events {
                self.max_events = max_events;
            }
        }

        if self.logging == LoggingOptions::default() {
            if let Some(logging) = config.logging {
                self.logging = logging;
            }
        }

        if self.output == OutputOptions::default() {
            if let Some(output) = config.output {
                self.output = output;
            }
        }

        self.network.merge(config.network.as_ref());
        self.mining.merge(config.mining.as_ref());
        self.pruning.merge(config.pruning.as_ref());

        Ok(self)
    }
}

fn default_max_events() -> u64 {
    DEFAULT_MAX_EVENTS
}

#[cfg(test)]
mod tests {
    use kozan_core::config::{
        DEFAULT_BLOCK_INTERVAL, DEFAULT_NODE_COUNT, DEFAULT_PRUNE_WATERMARK,
    };

    use super::*;

    #[test]
    fn default_args_build_the_default_config() {
        let args = SimArgs::parse_from(["kozan"]);
        let config = args.sim_config().unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn custom_flags_override_defaults() {
        let args = SimArgs::parse_from([
            "kozan",
            "--seed",
            "42",
            "--net.nodes",
            "64",
            "--net.hop-delay-ms",
            "250",
            "--mining.interval",
            "600",
            "--mining.miners",
            "0,3,9",
            "--prune.watermark",
            "500",
        ]);
        let config = args.sim_config().unwrap();

        assert_eq!(config.rng_seed, 42);
        assert_eq!(config.node_count, 64);
        assert_eq!(config.hop_delay_ms, 250);
        assert_eq!(config.block_interval, 600.0);
        assert_eq!(config.miner_selection, MinerSelection::Fixed { nodes: vec![0, 3, 9] });
        assert_eq!(config.prune_watermark, 500);
    }

    #[test]
    fn odd_node_count_is_rejected() {
        let args = SimArgs::parse_from(["kozan", "--net.nodes", "7"]);
        assert!(args.sim_config().is_err());
    }

    #[test]
    fn config_file_merges_beneath_cli_flags() {
        let content = r#"
seed = 7

[network]
nodes = 128
hop_delay_ms = 50

[mining]
interval = 120.0

[pruning]
watermark = 64
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kozan.toml");
        std::fs::write(&path, content).unwrap();

        let args = SimArgs::parse_from([
            "kozan",
            "--config",
            path.to_str().unwrap(),
            "--net.nodes",
            "32",
        ])
        .with_config_file()
        .unwrap();
        let config = args.sim_config().unwrap();

        // The CLI flag wins; everything else comes from the file.
        assert_eq!(config.node_count, 32);
        assert_eq!(config.rng_seed, 7);
        assert_eq!(config.hop_delay_ms, 50);
        assert_eq!(config.block_interval, 120.0);
        assert_eq!(config.prune_watermark, 64);
    }

    #[test]
    fn missing_groups_keep_defaults() {
        let content = "seed = 3\n";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kozan.toml");
        std::fs::write(&path, content).unwrap();

        let args = SimArgs::parse_from(["kozan", "--config", path.to_str().unwrap()])
            .with_config_file()
            .unwrap();
        let config = args.sim_config().unwrap();

        assert_eq!(config.rng_seed, 3);
        assert_eq!(config.node_count, DEFAULT_NODE_COUNT);
        assert_eq!(config.block_interval, DEFAULT_BLOCK_INTERVAL);
        assert_eq!(config.prune_watermark, DEFAULT_PRUNE_WATERMARK);
    }

    #[test]
    fn miner_list_conflicts_with_probability() {
        let parsed = SimArgs::try_parse_from([
            "kozan",
            "--mining.miners",
            "0,1",
            "--mining.probability",
            "0.5",
        ]);
        assert!(parsed.is_err());
    }
}
