use std::fmt::Display;

use clap::builder::PossibleValue;
use clap::ValueEnum;
use console::Style;
use kozan_core::SimulationSummary;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Full,
}

impl ValueEnum for LogFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Full]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        match self {
            Self::Json => Some(PossibleValue::new("json")),
            Self::Full => Some(PossibleValue::new("full")),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Full => write!(f, "full"),
        }
    }
}

pub fn print_summary(summary: &SimulationSummary) {
    let heading = Style::new().bold();

    println!(
        r"
{}
==========

| Virtual time    | {:.1} s
| Events fired    | {}
| Stable height   | {}
| Blocks live     | {}
| Max reorg depth | {}",
        heading.apply_to("SIMULATION"),
        summary.elapsed,
        summary.events_fired,
        summary.base_height,
        summary.blocks_live,
        summary.max_reorg,
    );

    println!(
        r"
{}
======",
        heading.apply_to("MINERS"),
    );

    for miner in &summary.miners {
        println!(
            r"
| Node            | {}
| Hashrate        | {}
| Blocks mined    | {}
| Blocks credited | {}",
            miner.node, miner.hashrate, miner.mined, miner.credit
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_round_trip() {
        assert_eq!(LogFormat::from_str("json", true).unwrap(), LogFormat::Json);
        assert_eq!(LogFormat::from_str("full", true).unwrap(), LogFormat::Full);
        assert_eq!(LogFormat::Json.to_string(), "json");
        assert_eq!(LogFormat::Full.to_string(), "full");
    }
}
