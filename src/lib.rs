// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # govsync
//!
//! Scheduled ingestion of government data sources (Treasury, FRED, BLS, ...)
//! into a local DuckDB database.
//!
//! ## Features
//!
//! - **Release-aware schedules**: daily, weekly, monthly, annual-after-release,
//!   quarterly-with-lag and quarterly-after-delay due-ness predicates
//! - **Declarative datasets**: YAML definitions for JSON and CSV sources
//! - **Bounded concurrency**: at most five datasets sync at once, failures isolated
//! - **Durable sync log**: every attempt recorded, last success drives scheduling
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use govsync::{build_registry, DuckDbSyncLog, HttpClient, RunOptions, Store, SyncEngine};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> govsync::Result<()> {
//!     let store = Store::open("govsync.duckdb")?;
//!     let engine = SyncEngine::new(
//!         Arc::new(build_registry(None)?),
//!         Arc::new(DuckDbSyncLog::open(store.clone())?),
//!         store,
//!         Arc::new(HttpClient::new()?),
//!         std::env::temp_dir().join("govsync"),
//!     );
//!
//!     let summary = engine.run(&RunOptions::new(), &CancellationToken::new()).await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          SyncEngine                             │
//! │  select → due? (SyncLog.last_success + Dataset.should_run)      │
//! │  start → Dataset.sync(ctx) → complete | fail      (≤ 5 at once) │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │ Registry │ Schedule  │  HttpDataset  │  SyncLog  │    Store    │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ Phase    │ Daily     │ Template      │ Memory    │ DuckDB      │
//! │ Names    │ Monthly   │ Download      │ DuckDB    │ Upsert      │
//! │          │ Quarterly │ JSON / CSV    │           │ Truncate    │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Injectable "now"
pub mod clock;

/// Due-ness predicates and declarative schedules
pub mod schedule;

/// The dataset contract
pub mod dataset;

/// Dataset registry
pub mod registry;

/// Sync attempt history
pub mod sync_log;

/// DuckDB store
pub mod database;

/// HTTP fetcher with retry and rate limiting
pub mod http;

/// Response decoders (JSON, CSV)
pub mod decode;

/// Template interpolation
pub mod template;

/// YAML loader for dataset definitions
pub mod loader;

/// Declarative HTTP datasets
pub mod connectors;

/// Main execution engine
pub mod engine;

/// Application configuration
pub mod config;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use connectors::{build_registry, HttpDataset};
pub use database::Store;
pub use dataset::{Dataset, SyncContext, SyncResult};
pub use engine::{RunOptions, RunSummary, SyncEngine};
pub use http::HttpClient;
pub use registry::Registry;
pub use schedule::Schedule;
pub use sync_log::{DuckDbSyncLog, MemorySyncLog, SyncLog};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
