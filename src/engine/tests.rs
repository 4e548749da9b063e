//! Tests for engine module

use super::*;
use crate::clock::fixed_clock;
use crate::dataset::SyncResult;
use crate::http::HttpClientConfig;
use crate::schedule;
use crate::sync_log::{MemorySyncLog, RunStatus, SyncRun};
use crate::types::{Cadence, Phase};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Test datasets
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Behavior {
    Succeed(i64),
    Fail,
    Panic,
    Sleep(Duration),
}

/// Tracks how many syncs run at once
#[derive(Debug, Default)]
struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct FakeDataset {
    name: String,
    phase: Phase,
    due: bool,
    behavior: Behavior,
    calls: AtomicUsize,
    saw_full: AtomicBool,
    gauge: Option<Arc<Gauge>>,
}

impl FakeDataset {
    fn new(name: &str, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            phase: Phase::Phase1,
            due: true,
            behavior,
            calls: AtomicUsize::new(0),
            saw_full: AtomicBool::new(false),
            gauge: None,
        }
    }

    fn not_due(mut self) -> Self {
        self.due = false;
        self
    }

    fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    fn gauged(mut self, gauge: &Arc<Gauge>) -> Self {
        self.gauge = Some(Arc::clone(gauge));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Dataset for FakeDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self) -> &str {
        &self.name
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn cadence(&self) -> Cadence {
        Cadence::Daily
    }

    fn should_run(&self, _now: DateTime<Utc>, last_sync: Option<DateTime<Utc>>) -> bool {
        last_sync.is_none() && self.due
    }

    async fn sync(&self, ctx: &SyncContext) -> Result<SyncResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.saw_full.store(ctx.full, Ordering::SeqCst);

        if let Some(gauge) = &self.gauge {
            let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
            gauge.peak.fetch_max(now, Ordering::SeqCst);
        }

        let result = match self.behavior {
            Behavior::Succeed(rows) => Ok(SyncResult::new(rows).with_meta("source", "fake")),
            Behavior::Fail => Err(Error::http_status(503, "upstream unavailable")),
            Behavior::Panic => panic!("parser blew up"),
            Behavior::Sleep(d) => {
                tokio::time::sleep(d).await;
                Ok(SyncResult::new(1))
            }
        };

        if let Some(gauge) = &self.gauge {
            gauge.current.fetch_sub(1, Ordering::SeqCst);
        }
        result
    }
}

/// Daily dataset whose due-ness comes from the real predicate
struct DailyDataset {
    calls: AtomicUsize,
    synced_at: std::sync::Mutex<Option<DateTime<Utc>>>,
}

#[async_trait]
impl Dataset for DailyDataset {
    fn name(&self) -> &str {
        "treasury_rates"
    }
    fn table(&self) -> &str {
        "treasury_rates"
    }
    fn phase(&self) -> Phase {
        Phase::Phase2
    }
    fn cadence(&self) -> Cadence {
        Cadence::Daily
    }
    fn should_run(&self, now: DateTime<Utc>, last_sync: Option<DateTime<Utc>>) -> bool {
        schedule::daily(now, last_sync)
    }
    async fn sync(&self, ctx: &SyncContext) -> Result<SyncResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.synced_at.lock().unwrap() = Some(ctx.now());
        Ok(SyncResult::new(3))
    }
}

/// Dataset whose due check itself panics
struct BrokenScheduleDataset;

#[async_trait]
impl Dataset for BrokenScheduleDataset {
    fn name(&self) -> &str {
        "broken_schedule"
    }
    fn table(&self) -> &str {
        "broken_schedule"
    }
    fn phase(&self) -> Phase {
        Phase::Phase1
    }
    fn cadence(&self) -> Cadence {
        Cadence::Daily
    }
    fn should_run(&self, _now: DateTime<Utc>, _last_sync: Option<DateTime<Utc>>) -> bool {
        panic!("bad cron expression")
    }
    async fn sync(&self, _ctx: &SyncContext) -> Result<SyncResult> {
        Ok(SyncResult::new(1))
    }
}

/// Sync log wrapper that injects bookkeeping failures
struct FlakyLog {
    inner: MemorySyncLog,
    fail_last_success_for: Option<&'static str>,
    fail_start_for: Option<&'static str>,
    fail_complete: bool,
    fail_fail: bool,
}

impl FlakyLog {
    fn new(inner: MemorySyncLog) -> Self {
        Self {
            inner,
            fail_last_success_for: None,
            fail_start_for: None,
            fail_complete: false,
            fail_fail: false,
        }
    }
}

#[async_trait]
impl SyncLog for FlakyLog {
    async fn last_success(&self, dataset: &str) -> Result<Option<DateTime<Utc>>> {
        if self.fail_last_success_for == Some(dataset) {
            return Err(Error::sync_log("connection reset"));
        }
        self.inner.last_success(dataset).await
    }

    async fn start(&self, dataset: &str) -> Result<RunId> {
        if self.fail_start_for == Some(dataset) {
            return Err(Error::sync_log("disk full"));
        }
        self.inner.start(dataset).await
    }

    async fn complete(&self, run: RunId, result: &RunResult) -> Result<()> {
        if self.fail_complete {
            return Err(Error::sync_log("disk full"));
        }
        self.inner.complete(run, result).await
    }

    async fn fail(&self, run: RunId, message: &str) -> Result<()> {
        if self.fail_fail {
            return Err(Error::sync_log("disk full"));
        }
        self.inner.fail(run, message).await
    }

    async fn recent(&self, dataset: Option<&str>, limit: usize) -> Result<Vec<SyncRun>> {
        self.inner.recent(dataset, limit).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn registry_of(datasets: Vec<Arc<FakeDataset>>) -> Arc<Registry> {
    let mut registry = Registry::new();
    for dataset in datasets {
        registry.register(dataset).unwrap();
    }
    Arc::new(registry)
}

fn engine_with(registry: Arc<Registry>, log: Arc<dyn SyncLog>) -> (SyncEngine, tempfile::TempDir) {
    let temp = tempfile::tempdir().unwrap();
    let fetcher = HttpClient::with_config(HttpClientConfig::builder().no_rate_limit().build()).unwrap();
    let engine = SyncEngine::new(
        registry,
        log,
        Store::open_in_memory().unwrap(),
        Arc::new(fetcher),
        temp.path().join("work"),
    );
    (engine, temp)
}

fn statuses(runs: &[SyncRun]) -> Vec<RunStatus> {
    runs.iter().map(|r| r.status).collect()
}

// ============================================================================
// Run semantics
// ============================================================================

#[tokio::test]
async fn test_due_skipped_and_failing_datasets() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(10)));
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(10)).not_due());
    let c = Arc::new(FakeDataset::new("c", Behavior::Fail));
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(
        registry_of(vec![a.clone(), b.clone(), c.clone()]),
        Arc::new(log.clone()),
    );

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            synced: 1,
            skipped: 1,
            failed: 1
        }
    );

    let runs_a = log.runs_for("a").await;
    assert_eq!(statuses(&runs_a), vec![RunStatus::Succeeded]);
    assert_eq!(runs_a[0].rows_synced, Some(10));
    let metadata = runs_a[0].metadata.as_ref().unwrap();
    assert_eq!(metadata.get("source"), Some(&serde_json::json!("fake")));
    assert!(metadata.contains_key("duration_ms"));

    assert!(log.runs_for("b").await.is_empty());
    assert_eq!(b.calls(), 0);

    let runs_c = log.runs_for("c").await;
    assert_eq!(statuses(&runs_c), vec![RunStatus::Failed]);
    assert!(runs_c[0].error.as_deref().unwrap().contains("503"));
}

#[tokio::test]
async fn test_force_bypasses_should_run() {
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(1)).not_due());
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(vec![b.clone()]), Arc::new(log.clone()));

    let summary = engine
        .run(&RunOptions::new().with_force(true), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.synced, 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_full_flag_reaches_dataset() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let (engine, _temp) = engine_with(registry_of(vec![a.clone()]), Arc::new(MemorySyncLog::new()));

    engine
        .run(&RunOptions::new().with_full(true), &CancellationToken::new())
        .await
        .unwrap();

    assert!(a.saw_full.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_failures_do_not_stop_other_datasets() {
    let datasets: Vec<Arc<FakeDataset>> = (0..8)
        .map(|i| {
            let behavior = if i % 2 == 0 {
                Behavior::Fail
            } else {
                Behavior::Succeed(i)
            };
            Arc::new(FakeDataset::new(&format!("ds{i}"), behavior))
        })
        .collect();
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(datasets.clone()), Arc::new(log.clone()));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.synced, 4);
    assert_eq!(summary.failed, 4);
    for dataset in &datasets {
        assert_eq!(dataset.calls(), 1, "{} not attempted once", dataset.name);
        assert_eq!(log.runs_for(&dataset.name).await.len(), 1);
    }
}

#[tokio::test]
async fn test_panicking_dataset_is_recorded_as_failed() {
    let boom = Arc::new(FakeDataset::new("boom", Behavior::Panic));
    let ok = Arc::new(FakeDataset::new("ok", Behavior::Succeed(2)));
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(vec![boom, ok]), Arc::new(log.clone()));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.synced, 1);
    assert_eq!(summary.failed, 1);
    let runs = log.runs_for("boom").await;
    assert_eq!(statuses(&runs), vec![RunStatus::Failed]);
    assert!(runs[0].error.as_deref().unwrap().contains("parser blew up"));
}

#[tokio::test]
async fn test_concurrency_is_capped() {
    let gauge = Arc::new(Gauge::default());
    let datasets: Vec<Arc<FakeDataset>> = (0..12)
        .map(|i| {
            Arc::new(
                FakeDataset::new(&format!("slow{i}"), Behavior::Sleep(Duration::from_millis(50)))
                    .gauged(&gauge),
            )
        })
        .collect();
    let (engine, _temp) = engine_with(registry_of(datasets), Arc::new(MemorySyncLog::new()));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.synced, 12);
    assert_eq!(gauge.peak.load(Ordering::SeqCst), MAX_CONCURRENT_SYNCS);
}

#[tokio::test]
async fn test_empty_selection_is_a_noop() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(vec![a.clone()]), Arc::new(log.clone()));

    let summary = engine
        .run(
            &RunOptions::new().with_phase(Phase::Phase3),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary, RunSummary::default());
    assert_eq!(a.calls(), 0);
    assert!(log.runs().await.is_empty());
}

#[tokio::test]
async fn test_phase_filter_selects_subset() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(1)).in_phase(Phase::Phase2));
    let (engine, _temp) = engine_with(
        registry_of(vec![a.clone(), b.clone()]),
        Arc::new(MemorySyncLog::new()),
    );

    let summary = engine
        .run(
            &RunOptions::new().with_phase(Phase::Phase2),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.total(), 1);
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_unknown_dataset_fails_before_any_work() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(vec![a.clone()]), Arc::new(log.clone()));

    let err = engine
        .run(
            &RunOptions::new().with_datasets(["a", "typo"]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DatasetNotFound { ref name } if name == "typo"));
    assert_eq!(a.calls(), 0);
    assert!(log.runs().await.is_empty());
}

// ============================================================================
// Cancellation
// ============================================================================

#[tokio::test]
async fn test_cancelled_before_run_starts_nothing() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(vec![a.clone()]), Arc::new(log.clone()));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = engine.run(&RunOptions::default(), &cancel).await.unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(a.calls(), 0);
    assert!(log.runs().await.is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run_drains_started_units() {
    let datasets: Vec<Arc<FakeDataset>> = (0..10)
        .map(|i| {
            Arc::new(FakeDataset::new(
                &format!("slow{i}"),
                Behavior::Sleep(Duration::from_millis(200)),
            ))
        })
        .collect();
    let log = MemorySyncLog::new();
    let (engine, _temp) = engine_with(registry_of(datasets.clone()), Arc::new(log.clone()));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        trigger.cancel();
    });

    let err = engine.run(&RunOptions::default(), &cancel).await.unwrap_err();
    assert!(err.is_cancelled());

    // The first wave finished and was recorded; nothing else started
    let started: usize = datasets.iter().map(|d| d.calls()).sum();
    assert_eq!(started, MAX_CONCURRENT_SYNCS);
    let runs = log.runs().await;
    assert_eq!(runs.len(), MAX_CONCURRENT_SYNCS);
    assert!(runs.iter().all(|r| r.status == RunStatus::Succeeded));
}

// ============================================================================
// Bookkeeping failures
// ============================================================================

#[tokio::test]
async fn test_start_failure_counts_as_failed() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(1)));
    let mut log = FlakyLog::new(MemorySyncLog::new());
    log.fail_start_for = Some("a");
    let (engine, _temp) = engine_with(registry_of(vec![a.clone(), b.clone()]), Arc::new(log));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_last_success_failure_counts_as_failed() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(1)));
    let mut log = FlakyLog::new(MemorySyncLog::new());
    log.fail_last_success_for = Some("b");
    let (engine, _temp) = engine_with(registry_of(vec![a.clone(), b.clone()]), Arc::new(log));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.synced, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_complete_failure_is_swallowed() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let mut log = FlakyLog::new(MemorySyncLog::new());
    log.fail_complete = true;
    let (engine, _temp) = engine_with(registry_of(vec![a.clone()]), Arc::new(log));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    // Counted from the sync outcome, not the bookkeeping write
    assert_eq!(summary.synced, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn test_fail_write_failure_is_swallowed() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Fail));
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(1)));
    let mut log = FlakyLog::new(MemorySyncLog::new());
    log.fail_fail = true;
    let (engine, _temp) = engine_with(registry_of(vec![a.clone(), b.clone()]), Arc::new(log));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_aborted_unit_counts_as_failed() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let mut registry = Registry::new();
    registry.register(Arc::new(BrokenScheduleDataset)).unwrap();
    registry.register(a.clone()).unwrap();
    let (engine, _temp) = engine_with(Arc::new(registry), Arc::new(MemorySyncLog::new()));

    let summary = engine
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.synced, 1);
    assert_eq!(a.calls(), 1);
}

// ============================================================================
// Scheduling through the log
// ============================================================================

#[tokio::test]
async fn test_last_success_drives_due_ness() {
    let dataset = Arc::new(DailyDataset {
        calls: AtomicUsize::new(0),
        synced_at: std::sync::Mutex::new(None),
    });
    let mut registry = Registry::new();
    registry.register(dataset.clone()).unwrap();
    let registry = Arc::new(registry);

    let log = MemorySyncLog::new();
    log.record_success(
        "treasury_rates",
        Utc.with_ymd_and_hms(2024, 3, 15, 2, 0, 0).unwrap(),
    )
    .await;

    let (engine, _temp) = engine_with(Arc::clone(&registry), Arc::new(log.clone()));
    let same_day = engine
        .clone()
        .with_clock(fixed_clock(Utc.with_ymd_and_hms(2024, 3, 15, 14, 0, 0).unwrap()));
    let summary = same_day
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.skipped, 1);
    assert_eq!(dataset.calls.load(Ordering::SeqCst), 0);

    let next_morning = Utc.with_ymd_and_hms(2024, 3, 16, 9, 0, 0).unwrap();
    let next_day = engine.with_clock(fixed_clock(next_morning));
    let summary = next_day
        .run(&RunOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(summary.synced, 1);
    assert_eq!(dataset.calls.load(Ordering::SeqCst), 1);
    // The dataset sees the engine's clock, not the wall clock
    assert_eq!(*dataset.synced_at.lock().unwrap(), Some(next_morning));
}

#[tokio::test]
async fn test_due_report() {
    let a = Arc::new(FakeDataset::new("a", Behavior::Succeed(1)));
    let b = Arc::new(FakeDataset::new("b", Behavior::Succeed(1)).not_due());
    let (engine, _temp) = engine_with(
        registry_of(vec![a.clone(), b.clone()]),
        Arc::new(MemorySyncLog::new()),
    );

    let report = engine.due(&RunOptions::default()).await.unwrap();
    let due: Vec<(&str, bool)> = report.iter().map(|s| (s.name.as_str(), s.due)).collect();
    assert_eq!(due, vec![("a", true), ("b", false)]);
    assert!(report.iter().all(|s| s.last_success.is_none()));

    let forced = engine
        .due(&RunOptions::new().with_force(true))
        .await
        .unwrap();
    assert!(forced.iter().all(|s| s.due));

    // Reporting never syncs
    assert_eq!(a.calls(), 0);
}

#[test]
fn test_run_summary_display() {
    let summary = RunSummary {
        synced: 3,
        skipped: 2,
        failed: 1,
    };
    assert_eq!(summary.to_string(), "synced=3 skipped=2 failed=1");
    assert_eq!(summary.total(), 6);
}

#[test]
fn test_panic_message() {
    let boxed: Box<dyn Any + Send> = Box::new("static str");
    assert_eq!(panic_message(boxed.as_ref()), "static str");
    let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
    assert_eq!(panic_message(boxed.as_ref()), "owned");
    let boxed: Box<dyn Any + Send> = Box::new(7_u8);
    assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
}
