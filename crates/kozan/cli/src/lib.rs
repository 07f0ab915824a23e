#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod args;
pub mod file;
pub mod options;
pub mod utils;

pub use args::SimArgs;
pub use file::SimArgsConfig;
pub use options::*;
