//! CLI module
//!
//! Command-line interface for the sync engine.
//!
//! # Commands
//!
//! - `run` - Sync every due dataset once
//! - `due` - Show which datasets are due
//! - `list` - List registered datasets
//! - `status` - Show recent sync attempts
//! - `daemon` - Run the engine on an interval until interrupted

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, Selection};
pub use runner::Runner;
