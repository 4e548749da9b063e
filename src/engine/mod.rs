//! Execution engine module
//!
//! Runs a batch of datasets with bounded concurrency.
//!
//! # Overview
//!
//! For every selected dataset the engine:
//! 1. reads the last successful run from the sync log and asks the dataset
//!    whether it is due (skipped when `force` is set)
//! 2. records a `start` entry
//! 3. calls `Dataset::sync` with the shared store, fetcher and temp dir
//! 4. records `complete` or `fail`
//!
//! At most [`MAX_CONCURRENT_SYNCS`] datasets sync at once. One dataset
//! failing never stops the others; only structural problems (selection,
//! cancellation) fail the run.

mod types;

pub use types::{DueStatus, RunOptions, RunSummary};

use types::RunCounters;

use crate::clock::{system_clock, Clock};
use crate::database::Store;
use crate::dataset::{Dataset, SyncContext};
use crate::error::{Error, Result, ResultExt};
use crate::http::HttpClient;
use crate::registry::Registry;
use crate::sync_log::{RunId, RunResult, SyncLog};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Upper bound on datasets syncing at the same time
pub const MAX_CONCURRENT_SYNCS: usize = 5;

/// Sync engine for orchestrating dataset runs
#[derive(Clone)]
pub struct SyncEngine {
    registry: Arc<Registry>,
    sync_log: Arc<dyn SyncLog>,
    store: Store,
    fetcher: Arc<HttpClient>,
    temp_dir: PathBuf,
    clock: Clock,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        registry: Arc<Registry>,
        sync_log: Arc<dyn SyncLog>,
        store: Store,
        fetcher: Arc<HttpClient>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            registry,
            sync_log,
            store,
            fetcher,
            temp_dir: temp_dir.into(),
            clock: system_clock(),
        }
    }

    /// Read "now" from a custom clock
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn sync_log(&self) -> &Arc<dyn SyncLog> {
        &self.sync_log
    }

    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Run every selected dataset that is due (or all of them when forced).
    ///
    /// Individual dataset failures are counted, not returned. Errors are
    /// returned for an invalid selection, an unusable temp dir, or when
    /// `cancel` fired before every unit got to start.
    pub async fn run(&self, options: &RunOptions, cancel: &CancellationToken) -> Result<RunSummary> {
        let started = Instant::now();
        let selected = self.registry.select(options.phase, &options.datasets)?;

        if selected.is_empty() {
            info!(
                phase = ?options.phase,
                datasets = ?options.datasets,
                "No datasets selected"
            );
            return Ok(RunSummary::default());
        }

        tokio::fs::create_dir_all(&self.temp_dir)
            .await
            .with_context(|| format!("engine: create temp dir {}", self.temp_dir.display()))?;

        info!(
            datasets = selected.len(),
            force = options.force,
            full = options.full,
            "Starting sync run"
        );

        let counters = Arc::new(RunCounters::default());
        let permits = Arc::new(Semaphore::new(MAX_CONCURRENT_SYNCS));
        let mut units = JoinSet::new();

        for dataset in selected {
            let engine = self.clone();
            let counters = Arc::clone(&counters);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let (force, full) = (options.force, options.full);

            units.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(Error::Cancelled),
                    permit = permits.acquire_owned() => {
                        permit.map_err(|e| Error::Other(format!("engine: concurrency limiter closed: {e}")))?
                    }
                };
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                engine
                    .sync_one(dataset, force, full, &cancel, &counters)
                    .await;
                Ok(())
            });
        }

        let mut cancelled = false;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => cancelled = true,
                Ok(Err(e)) => {
                    error!(error = %e, "Dataset unit failed to start");
                    counters.failed();
                }
                Err(e) => {
                    error!(error = %e, "Dataset unit aborted");
                    counters.failed();
                }
            }
        }

        let summary = counters.snapshot();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            synced = summary.synced,
            skipped = summary.skipped,
            failed = summary.failed,
            elapsed_ms,
            "Sync run finished: {summary}"
        );

        if cancelled {
            warn!("Sync run cancelled before every dataset started");
            return Err(Error::Cancelled);
        }
        Ok(summary)
    }

    /// Which selected datasets are due right now, without syncing anything
    pub async fn due(&self, options: &RunOptions) -> Result<Vec<DueStatus>> {
        let now = (self.clock)();
        let mut report = Vec::new();

        for dataset in self.registry.select(options.phase, &options.datasets)? {
            let last_success = self
                .sync_log
                .last_success(dataset.name())
                .await
                .with_context(|| format!("engine: read last success for {}", dataset.name()))?;
            report.push(DueStatus {
                name: dataset.name().to_string(),
                phase: dataset.phase(),
                cadence: dataset.cadence(),
                last_success,
                due: options.force || dataset.should_run(now, last_success),
            });
        }

        Ok(report)
    }

    /// One dataset's unit of work; outcomes land in `counters`
    async fn sync_one(
        &self,
        dataset: Arc<dyn Dataset>,
        force: bool,
        full: bool,
        cancel: &CancellationToken,
        counters: &RunCounters,
    ) {
        let name = dataset.name().to_string();
        let now = (self.clock)();

        if !force {
            let last_success = match self.sync_log.last_success(&name).await {
                Ok(last) => last,
                Err(e) => {
                    error!(dataset = %name, error = %e, "engine: read last success failed");
                    counters.failed();
                    return;
                }
            };
            if !dataset.should_run(now, last_success) {
                info!(dataset = %name, last_success = ?last_success, "Skipping, not due");
                counters.skipped();
                return;
            }
        }

        let run_id = match self
            .sync_log
            .start(&name)
            .await
            .with_context(|| format!("engine: start sync log for {name}"))
        {
            Ok(id) => id,
            Err(e) => {
                error!(dataset = %name, error = %e, "Could not record sync start");
                counters.failed();
                return;
            }
        };

        let span = info_span!("sync", dataset = %name, run_id = %run_id);
        let ctx = SyncContext::new(self.store.clone(), Arc::clone(&self.fetcher), &self.temp_dir)
            .with_full(full)
            .with_cancel(cancel.clone())
            .with_span(span.clone())
            .with_now(now);

        info!(parent: &span, table = dataset.table(), full, "Sync started");
        let timer = Instant::now();
        let outcome = AssertUnwindSafe(dataset.sync(&ctx).instrument(span.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(Error::Other(format!(
                    "dataset panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });
        let elapsed_ms = timer.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                let mut result: RunResult = result.into();
                result
                    .metadata
                    .insert("duration_ms".to_string(), elapsed_ms.into());
                info!(
                    parent: &span,
                    rows = result.rows_synced,
                    elapsed_ms,
                    "Sync succeeded"
                );
                self.record_complete(run_id, &result, &span).await;
                counters.synced();
            }
            Err(e) => {
                error!(parent: &span, error = %e, elapsed_ms, "Sync failed");
                self.record_fail(run_id, &e.to_string(), &span).await;
                counters.failed();
            }
        }
    }

    async fn record_complete(&self, run_id: RunId, result: &RunResult, span: &tracing::Span) {
        if let Err(e) = self.sync_log.complete(run_id, result).await {
            warn!(parent: span, error = %e, "engine: complete sync log failed");
        } else {
            debug!(parent: span, "Recorded success");
        }
    }

    async fn record_fail(&self, run_id: RunId, message: &str, span: &tracing::Span) {
        if let Err(e) = self.sync_log.fail(run_id, message).await {
            warn!(parent: span, error = %e, "engine: fail sync log failed");
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("registry", &self.registry)
            .field("store", &self.store)
            .field("temp_dir", &self.temp_dir)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests;
