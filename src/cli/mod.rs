//! Command-line harness
//!
//! Runs the agent's events against the on-disk store and the real network.

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
