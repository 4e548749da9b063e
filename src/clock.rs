//! Injectable wall clock
//!
//! Scheduling decisions and sync-log timestamps read "now" through a
//! [`Clock`] so tests can pin time.

use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Source of the current UTC time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The real system clock
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// A clock frozen at `at`
pub fn fixed_clock(at: DateTime<Utc>) -> Clock {
    Arc::new(move || at)
}
