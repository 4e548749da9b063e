//! Sync log persisted in the `sync_log` table
//!
//! Timestamps are stored as microseconds since the Unix epoch so ordering
//! is plain integer ordering.

use super::{RunId, RunResult, RunStatus, SyncLog, SyncRun};
use crate::clock::{system_clock, Clock};
use crate::database::Store;
use crate::error::{Error, Result};
use crate::types::ValueMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::params;

const SCHEMA: &str = "
CREATE SEQUENCE IF NOT EXISTS sync_log_id_seq START 1;
CREATE TABLE IF NOT EXISTS sync_log (
    id BIGINT PRIMARY KEY DEFAULT nextval('sync_log_id_seq'),
    dataset VARCHAR NOT NULL,
    started_at_us BIGINT NOT NULL,
    completed_at_us BIGINT,
    status VARCHAR NOT NULL,
    rows_synced BIGINT,
    metadata VARCHAR,
    error VARCHAR
);
";

const SELECT_COLUMNS: &str =
    "id, dataset, started_at_us, completed_at_us, status, rows_synced, metadata, error";

/// Raw row as read from DuckDB, converted outside the row closure
type RawRun = (
    i64,
    String,
    i64,
    Option<i64>,
    String,
    Option<i64>,
    Option<String>,
    Option<String>,
);

/// Sync log stored in the shared DuckDB database
#[derive(Clone)]
pub struct DuckDbSyncLog {
    store: Store,
    clock: Clock,
}

impl DuckDbSyncLog {
    /// Open the log, creating the table on first use
    pub fn open(store: Store) -> Result<Self> {
        store.with_conn(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })?;
        Ok(Self {
            store,
            clock: system_clock(),
        })
    }

    /// Stamp runs with a custom clock
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    async fn transition(
        &self,
        run: RunId,
        status: RunStatus,
        rows_synced: Option<i64>,
        metadata: Option<String>,
        error: Option<String>,
    ) -> Result<()> {
        let completed_at = (self.clock)().timestamp_micros();
        let updated = self
            .store
            .run_blocking(move |conn| {
                Ok(conn.execute(
                    "UPDATE sync_log
                     SET status = ?, completed_at_us = ?, rows_synced = ?, metadata = ?, error = ?
                     WHERE id = ? AND status = 'running'",
                    params![
                        status.as_str(),
                        completed_at,
                        rows_synced,
                        metadata,
                        error,
                        run.0
                    ],
                )?)
            })
            .await?;

        if updated == 0 {
            return Err(Error::sync_log(format!(
                "run {run} is unknown or no longer running"
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DuckDbSyncLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbSyncLog")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SyncLog for DuckDbSyncLog {
    async fn last_success(&self, dataset: &str) -> Result<Option<DateTime<Utc>>> {
        let dataset = dataset.to_string();
        let micros = self
            .store
            .run_blocking(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT started_at_us FROM sync_log
                     WHERE dataset = ? AND status = 'succeeded'
                     ORDER BY started_at_us DESC
                     LIMIT 1",
                )?;
                let mut rows = stmt.query(params![dataset])?;
                match rows.next()? {
                    Some(row) => Ok(Some(row.get::<_, i64>(0)?)),
                    None => Ok(None),
                }
            })
            .await?;

        micros.map(from_micros).transpose()
    }

    async fn start(&self, dataset: &str) -> Result<RunId> {
        let dataset = dataset.to_string();
        let started_at = (self.clock)().timestamp_micros();
        let id = self
            .store
            .run_blocking(move |conn| {
                Ok(conn.query_row(
                    "INSERT INTO sync_log (dataset, started_at_us, status)
                     VALUES (?, ?, 'running')
                     RETURNING id",
                    params![dataset, started_at],
                    |row| row.get::<_, i64>(0),
                )?)
            })
            .await?;
        Ok(RunId(id))
    }

    async fn complete(&self, run: RunId, result: &RunResult) -> Result<()> {
        let metadata = serde_json::to_string(&result.metadata)?;
        self.transition(
            run,
            RunStatus::Succeeded,
            Some(result.rows_synced),
            Some(metadata),
            None,
        )
        .await
    }

    async fn fail(&self, run: RunId, message: &str) -> Result<()> {
        self.transition(run, RunStatus::Failed, None, None, Some(message.to_string()))
            .await
    }

    async fn recent(&self, dataset: Option<&str>, limit: usize) -> Result<Vec<SyncRun>> {
        let dataset = dataset.map(ToString::to_string);
        let limit = limit as i64;
        let raw: Vec<RawRun> = self
            .store
            .run_blocking(move |conn| {
                let map_row = |row: &duckdb::Row<'_>| -> duckdb::Result<RawRun> {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ))
                };
                let rows = match dataset {
                    Some(name) => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {SELECT_COLUMNS} FROM sync_log WHERE dataset = ?
                             ORDER BY started_at_us DESC, id DESC LIMIT ?"
                        ))?;
                        let rows = stmt
                            .query_map(params![name, limit], map_row)?
                            .collect::<duckdb::Result<Vec<_>>>()?;
                        rows
                    }
                    None => {
                        let mut stmt = conn.prepare(&format!(
                            "SELECT {SELECT_COLUMNS} FROM sync_log
                             ORDER BY started_at_us DESC, id DESC LIMIT ?"
                        ))?;
                        let rows = stmt
                            .query_map(params![limit], map_row)?
                            .collect::<duckdb::Result<Vec<_>>>()?;
                        rows
                    }
                };
                Ok(rows)
            })
            .await?;

        raw.into_iter().map(into_sync_run).collect()
    }
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| Error::sync_log(format!("timestamp out of range: {micros}")))
}

fn into_sync_run(raw: RawRun) -> Result<SyncRun> {
    let (id, dataset, started, completed, status, rows_synced, metadata, error) = raw;
    let metadata = metadata
        .map(|m| serde_json::from_str::<ValueMap>(&m))
        .transpose()?;
    Ok(SyncRun {
        id: RunId(id),
        dataset,
        started_at: from_micros(started)?,
        completed_at: completed.map(from_micros).transpose()?,
        status: status.parse()?,
        rows_synced,
        metadata,
        error,
    })
}
