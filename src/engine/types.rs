//! Engine types
//!
//! Run options, the run summary, and the per-dataset due report.

use crate::types::{Cadence, Phase};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Options for one engine run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Only datasets in this phase
    pub phase: Option<Phase>,
    /// Only these datasets (empty = all)
    pub datasets: Vec<String>,
    /// Ignore due-ness and sync everything selected
    pub force: bool,
    /// Ask connectors for a full reload instead of an incremental one
    pub full: bool,
}

impl RunOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }

    #[must_use]
    pub fn with_datasets<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.datasets = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_full(mut self, full: bool) -> Self {
        self.full = full;
        self
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub synced: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    /// Datasets that reached a decision
    pub fn total(&self) -> usize {
        self.synced + self.skipped + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "synced={} skipped={} failed={}",
            self.synced, self.skipped, self.failed
        )
    }
}

/// Lock-free counters shared by concurrent dataset units
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    synced: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl RunCounters {
    pub(crate) fn synced(&self) {
        self.synced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> RunSummary {
        RunSummary {
            synced: self.synced.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Due-ness of one dataset at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DueStatus {
    pub name: String,
    pub phase: Phase,
    pub cadence: Cadence,
    pub last_success: Option<DateTime<Utc>>,
    pub due: bool,
}
