#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::process::exit;

use anyhow::Result;
use clap::Parser;
use kozan_cli::SimArgs;

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    SimArgs::parse().with_config_file()?.execute()
}
