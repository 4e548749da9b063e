//! Scheduling module
//!
//! Pure due-ness predicates for daily, weekly, monthly, quarterly and
//! annual datasets, plus the declarative [`Schedule`] that selects one.
//!
//! # Overview
//!
//! - `daily` / `weekly` / `monthly` - one run per calendar period
//! - `annual_after_release` - one run per year once the release month arrives
//! - `quarterly_with_lag` / `quarterly_after_delay` - one run per quarter once
//!   its data has had time to be published

mod predicates;
mod types;

pub use predicates::{
    annual_after_release, daily, monthly, quarterly_after_delay, quarterly_with_lag, weekly,
};
pub use types::Schedule;
