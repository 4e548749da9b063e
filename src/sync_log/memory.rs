//! In-memory sync log

use super::{RunId, RunResult, RunStatus, SyncLog, SyncRun};
use crate::clock::{system_clock, Clock};
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Sync log held in process memory
#[derive(Clone)]
pub struct MemorySyncLog {
    runs: Arc<RwLock<Vec<SyncRun>>>,
    clock: Clock,
}

impl MemorySyncLog {
    pub fn new() -> Self {
        Self {
            runs: Arc::new(RwLock::new(Vec::new())),
            clock: system_clock(),
        }
    }

    /// Stamp runs with a custom clock
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Seed a finished, successful run (handy for scheduling tests)
    pub async fn record_success(&self, dataset: &str, started_at: DateTime<Utc>) -> RunId {
        let mut runs = self.runs.write().await;
        let id = RunId(runs.len() as i64 + 1);
        runs.push(SyncRun {
            id,
            dataset: dataset.to_string(),
            started_at,
            completed_at: Some(started_at),
            status: RunStatus::Succeeded,
            rows_synced: Some(0),
            metadata: None,
            error: None,
        });
        id
    }

    /// Every recorded run, in insertion order
    pub async fn runs(&self) -> Vec<SyncRun> {
        self.runs.read().await.clone()
    }

    /// Runs recorded for one dataset, in insertion order
    pub async fn runs_for(&self, dataset: &str) -> Vec<SyncRun> {
        self.runs
            .read()
            .await
            .iter()
            .filter(|r| r.dataset == dataset)
            .cloned()
            .collect()
    }

    async fn finish(
        &self,
        run: RunId,
        apply: impl FnOnce(&mut SyncRun),
    ) -> Result<()> {
        let now = (self.clock)();
        let mut runs = self.runs.write().await;
        let record = runs
            .iter_mut()
            .find(|r| r.id == run)
            .ok_or_else(|| Error::sync_log(format!("unknown run {run}")))?;
        if record.status != RunStatus::Running {
            return Err(Error::sync_log(format!(
                "run {run} is already {}",
                record.status
            )));
        }
        record.completed_at = Some(now);
        apply(record);
        Ok(())
    }
}

impl Default for MemorySyncLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemorySyncLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySyncLog").finish_non_exhaustive()
    }
}

#[async_trait]
impl SyncLog for MemorySyncLog {
    async fn last_success(&self, dataset: &str) -> Result<Option<DateTime<Utc>>> {
        let runs = self.runs.read().await;
        Ok(runs
            .iter()
            .filter(|r| r.dataset == dataset && r.status == RunStatus::Succeeded)
            .map(|r| r.started_at)
            .max())
    }

    async fn start(&self, dataset: &str) -> Result<RunId> {
        let started_at = (self.clock)();
        let mut runs = self.runs.write().await;
        let id = RunId(runs.len() as i64 + 1);
        runs.push(SyncRun {
            id,
            dataset: dataset.to_string(),
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            rows_synced: None,
            metadata: None,
            error: None,
        });
        Ok(id)
    }

    async fn complete(&self, run: RunId, result: &RunResult) -> Result<()> {
        self.finish(run, |record| {
            record.status = RunStatus::Succeeded;
            record.rows_synced = Some(result.rows_synced);
            record.metadata = Some(result.metadata.clone());
        })
        .await
    }

    async fn fail(&self, run: RunId, message: &str) -> Result<()> {
        self.finish(run, |record| {
            record.status = RunStatus::Failed;
            record.error = Some(message.to_string());
        })
        .await
    }

    async fn recent(&self, dataset: Option<&str>, limit: usize) -> Result<Vec<SyncRun>> {
        let runs = self.runs.read().await;
        let mut selected: Vec<SyncRun> = runs
            .iter()
            .filter(|r| dataset.map_or(true, |d| r.dataset == d))
            .cloned()
            .collect();
        selected.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        selected.truncate(limit);
        Ok(selected)
    }
}
