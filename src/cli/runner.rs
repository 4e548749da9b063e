//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, Selection};
use crate::config::AppConfig;
use crate::connectors::build_registry;
use crate::database::Store;
use crate::engine::{RunOptions, SyncEngine};
use crate::error::{Error, Result, ResultExt};
use crate::http::HttpClient;
use crate::registry::Registry;
use crate::sync_log::{DuckDbSyncLog, SyncLog};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        let config = self.load_config()?;
        debug!(?config, "Loaded configuration");

        match &self.cli.command {
            Commands::Run {
                selection,
                force,
                full,
            } => {
                let options = run_options(selection).with_force(*force).with_full(*full);
                self.run_once(&config, &options).await
            }
            Commands::Due { selection } => self.due(&config, &run_options(selection)).await,
            Commands::List => self.list(&config),
            Commands::Status { dataset, limit } => {
                self.status(&config, dataset.as_deref(), *limit).await
            }
            Commands::Daemon {
                interval_minutes,
                selection,
            } => {
                let minutes = interval_minutes.unwrap_or(config.daemon.interval_minutes);
                if minutes == 0 {
                    return Err(Error::invalid_value("interval-minutes", "must be at least 1"));
                }
                self.daemon(
                    &config,
                    &run_options(selection),
                    Duration::from_secs(minutes * 60),
                )
                .await
            }
        }
    }

    /// Config file + environment, then command-line overrides
    fn load_config(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(self.cli.config.as_deref())?;
        if let Some(database) = &self.cli.database {
            config.database = database.clone();
        }
        Ok(config)
    }

    /// One engine run; Ctrl-C cancels it
    async fn run_once(&self, config: &AppConfig, options: &RunOptions) -> Result<()> {
        let engine = build_engine(config)?;
        let cancel = cancel_on_ctrl_c();

        let summary = engine.run(options, &cancel).await?;
        self.output_message(&json!({
            "type": "SUMMARY",
            "synced": summary.synced,
            "skipped": summary.skipped,
            "failed": summary.failed
        }));
        Ok(())
    }

    /// Report due-ness without syncing
    async fn due(&self, config: &AppConfig, options: &RunOptions) -> Result<()> {
        let engine = build_engine(config)?;
        let report = engine.due(options).await?;

        self.output_message(&json!({
            "type": "DUE",
            "datasets": report
        }));
        Ok(())
    }

    /// List registered datasets
    fn list(&self, config: &AppConfig) -> Result<()> {
        let registry = load_registry(config)?;

        let datasets: Vec<Value> = registry
            .iter()
            .map(|dataset| {
                json!({
                    "name": dataset.name(),
                    "table": dataset.table(),
                    "phase": dataset.phase(),
                    "cadence": dataset.cadence(),
                    "schedule": dataset.schedule().map(ToString::to_string)
                })
            })
            .collect();

        self.output_message(&json!({
            "type": "DATASETS",
            "datasets": datasets
        }));
        Ok(())
    }

    /// Recent sync-log rows, newest first
    async fn status(&self, config: &AppConfig, dataset: Option<&str>, limit: usize) -> Result<()> {
        let store = Store::open(&config.database)
            .with_context(|| format!("open database {}", config.database.display()))?;
        let sync_log = DuckDbSyncLog::open(store)?;
        let runs = sync_log.recent(dataset, limit).await?;

        self.output_message(&json!({
            "type": "RUNS",
            "runs": runs
        }));
        Ok(())
    }

    /// Run the engine every `interval` until Ctrl-C
    async fn daemon(
        &self,
        config: &AppConfig,
        options: &RunOptions,
        interval: Duration,
    ) -> Result<()> {
        let engine = build_engine(config)?;
        // Fail fast on a bad selection instead of logging it every tick
        engine.registry().select(options.phase, &options.datasets)?;

        let cancel = cancel_on_ctrl_c();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Daemon started");
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match engine.run(options, &cancel).await {
                Ok(summary) => self.output_message(&json!({
                    "type": "SUMMARY",
                    "synced": summary.synced,
                    "skipped": summary.skipped,
                    "failed": summary.failed
                })),
                Err(e) if e.is_cancelled() => break,
                Err(e) => error!(error = %e, "Scheduled run failed"),
            }
        }

        info!("Daemon stopped");
        Ok(())
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

fn run_options(selection: &Selection) -> RunOptions {
    let mut options = RunOptions::new().with_datasets(
        selection
            .dataset
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty()),
    );
    options.phase = selection.phase;
    options
}

fn load_registry(config: &AppConfig) -> Result<Registry> {
    build_registry(config.datasets_dir.as_deref())
}

/// Wire the store, sync log, fetcher and registry into an engine
fn build_engine(config: &AppConfig) -> Result<SyncEngine> {
    let registry = Arc::new(load_registry(config)?);
    let store = Store::open(&config.database)
        .with_context(|| format!("open database {}", config.database.display()))?;
    let sync_log: Arc<dyn SyncLog> = Arc::new(DuckDbSyncLog::open(store.clone())?);
    let fetcher = Arc::new(HttpClient::with_config(config.http.client_config())?);

    debug!(
        database = %config.database.display(),
        temp_dir = %config.temp_dir.display(),
        datasets = registry.len(),
        "Engine ready"
    );
    Ok(SyncEngine::new(
        registry,
        sync_log,
        store,
        fetcher,
        &config.temp_dir,
    ))
}

/// Token that fires on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            token.cancel();
        }
    });
    cancel
}
