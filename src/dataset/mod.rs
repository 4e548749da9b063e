//! Dataset contract
//!
//! Every connector is one implementation of [`Dataset`]. The engine drives
//! them polymorphically and never looks past this trait.

use crate::database::Store;
use crate::error::{Error, Result};
use crate::http::HttpClient;
use crate::schedule::Schedule;
use crate::sync_log::RunResult;
use crate::types::{Cadence, Phase, ValueMap};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What a successful sync reports back
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub rows_synced: i64,
    #[serde(default)]
    pub metadata: ValueMap,
}

impl SyncResult {
    pub fn new(rows_synced: i64) -> Self {
        Self {
            rows_synced,
            metadata: ValueMap::new(),
        }
    }

    /// Attach one metadata entry
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl From<SyncResult> for RunResult {
    fn from(result: SyncResult) -> Self {
        RunResult {
            rows_synced: result.rows_synced,
            metadata: result.metadata,
        }
    }
}

/// Shared handles passed to every dataset in a run.
///
/// The store, fetcher and temp directory are shared across concurrently
/// syncing datasets; the engine does not partition or lock them.
#[derive(Clone)]
pub struct SyncContext {
    /// Shared database handle
    pub store: Store,
    /// Shared HTTP fetcher
    pub fetcher: Arc<HttpClient>,
    /// Scratch directory for downloads
    pub temp_dir: PathBuf,
    /// Full reload requested
    pub full: bool,
    /// Run-scoped cancellation
    pub cancel: CancellationToken,
    /// Span carrying this dataset's identity; connector logs nest under it
    pub span: tracing::Span,
    /// Run clock reading; templates render against it
    pub now: DateTime<Utc>,
}

impl SyncContext {
    pub fn new(store: Store, fetcher: Arc<HttpClient>, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            fetcher,
            temp_dir: temp_dir.into(),
            full: false,
            cancel: CancellationToken::new(),
            span: tracing::Span::none(),
            now: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Bail out with [`Error::Cancelled`] if the run was cancelled
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("store", &self.store)
            .field("temp_dir", &self.temp_dir)
            .field("full", &self.full)
            .field("now", &self.now)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// One independently schedulable ingestion connector
#[async_trait]
pub trait Dataset: Send + Sync {
    /// Unique stable key, also the sync log identity
    fn name(&self) -> &str;

    /// Destination table, informational
    fn table(&self) -> &str;

    fn phase(&self) -> Phase;

    /// Nominal refresh frequency, informational
    fn cadence(&self) -> Cadence;

    /// Pure due-ness predicate; `last_sync` is `None` when never synced
    fn should_run(&self, now: DateTime<Utc>, last_sync: Option<DateTime<Utc>>) -> bool;

    /// Declarative schedule, when the dataset has one
    fn schedule(&self) -> Option<&Schedule> {
        None
    }

    /// Fetch, transform and load
    async fn sync(&self, ctx: &SyncContext) -> Result<SyncResult>;
}

impl std::fmt::Debug for dyn Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name())
            .field("table", &self.table())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
