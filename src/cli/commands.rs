//! CLI commands and argument parsing

use crate::types::Phase;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Scheduled ingestion of government data sources into DuckDB
#[derive(Parser, Debug)]
#[command(name = "govsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// DuckDB database file (overrides config)
    #[arg(short, long, global = true, env = "GOVSYNC_DATABASE")]
    pub database: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sync every due dataset once
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Sync even if not due
        #[arg(long)]
        force: bool,

        /// Reload tables from scratch
        #[arg(long)]
        full: bool,
    },

    /// Show which datasets are due, without syncing
    Due {
        #[command(flatten)]
        selection: Selection,
    },

    /// List registered datasets
    List,

    /// Show recent sync attempts
    Status {
        /// Only this dataset
        #[arg(long)]
        dataset: Option<String>,

        /// Maximum rows to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// Run the engine periodically until interrupted
    Daemon {
        /// Minutes between runs (overrides config)
        #[arg(long)]
        interval_minutes: Option<u64>,

        #[command(flatten)]
        selection: Selection,
    },
}

/// Dataset selection shared by `run`, `due` and `daemon`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Selection {
    /// Only datasets in this phase (1, 1b, 2, 3)
    #[arg(long)]
    pub phase: Option<Phase>,

    /// Datasets to sync (comma-separated, empty = all)
    #[arg(long, value_delimiter = ',')]
    pub dataset: Vec<String>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
