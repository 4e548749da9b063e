//! Sync log module
//!
//! Durable, append-only record of sync attempts per dataset. The engine
//! reads the last successful run to decide due-ness, and writes one record
//! per attempt: `start` creates it in the running state, then exactly one of
//! `complete` or `fail` moves it to a terminal state.
//!
//! # Overview
//!
//! - `SyncLog` - the contract the engine depends on
//! - `MemorySyncLog` - process-local log for tests and dry runs
//! - `DuckDbSyncLog` - `sync_log` table in the shared store

mod duckdb_log;
mod memory;

pub use duckdb_log::DuckDbSyncLog;
pub use memory::MemorySyncLog;

use crate::error::{Error, Result};
use crate::types::ValueMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of one sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a sync attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "running" => Ok(RunStatus::Running),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            other => Err(Error::sync_log(format!("unknown run status '{other}'"))),
        }
    }
}

/// Outcome stamped on a successful run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub rows_synced: i64,
    #[serde(default)]
    pub metadata: ValueMap,
}

/// One persisted sync attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: RunId,
    pub dataset: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub rows_synced: Option<i64>,
    pub metadata: Option<ValueMap>,
    pub error: Option<String>,
}

/// Durable record of sync attempts, keyed by dataset name.
///
/// Calls for different datasets must not interfere with each other.
#[async_trait]
pub trait SyncLog: Send + Sync {
    /// Start time of the newest succeeded run, `None` if there is none.
    /// Failed and running attempts are ignored.
    async fn last_success(&self, dataset: &str) -> Result<Option<DateTime<Utc>>>;

    /// Record a new attempt in the running state
    async fn start(&self, dataset: &str) -> Result<RunId>;

    /// Move a running attempt to succeeded
    async fn complete(&self, run: RunId, result: &RunResult) -> Result<()>;

    /// Move a running attempt to failed
    async fn fail(&self, run: RunId, message: &str) -> Result<()>;

    /// Most recent attempts, newest first, optionally for one dataset
    async fn recent(&self, dataset: Option<&str>, limit: usize) -> Result<Vec<SyncRun>>;
}
