//! Command-line interface for the sweeper

pub mod commands;

pub use commands::{balance, sweep, CliResult};
