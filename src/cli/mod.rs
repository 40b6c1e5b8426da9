//! Command-line interface for tag-sleuth.
//!
//! `resolve` processes an input tree; `check-tools` and `cache` are
//! maintenance helpers.

mod commands;

pub use commands::{Cli, Commands, run_command};
