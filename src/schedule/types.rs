//! Declarative schedules
//!
//! A `Schedule` names one predicate family plus its parameters so that
//! datasets declared in YAML can pick their due-ness rule.

use super::predicates;
use crate::error::{Error, Result};
use crate::types::Cadence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Due-ness rule for a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Schedule {
    /// Once per UTC day
    Daily,
    /// Once per Monday-start week
    Weekly,
    /// Once per calendar month
    Monthly,
    /// Once a year, from the first day of `month`
    AnnualAfterRelease {
        /// Release month (1-12)
        month: u32,
    },
    /// Each quarter, `lag_months` after the quarter ends
    QuarterlyWithLag {
        /// Months between quarter end and availability
        lag_months: u32,
    },
    /// Each quarter, `delay_days` after the quarter ends
    QuarterlyAfterDelay {
        /// Days between quarter end and availability
        delay_days: u32,
    },
}

impl Schedule {
    /// Decide whether a sync is due
    pub fn should_run(&self, now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> bool {
        match *self {
            Schedule::Daily => predicates::daily(now, last),
            Schedule::Weekly => predicates::weekly(now, last),
            Schedule::Monthly => predicates::monthly(now, last),
            Schedule::AnnualAfterRelease { month } => {
                predicates::annual_after_release(now, last, month)
            }
            Schedule::QuarterlyWithLag { lag_months } => {
                predicates::quarterly_with_lag(now, last, lag_months)
            }
            Schedule::QuarterlyAfterDelay { delay_days } => {
                predicates::quarterly_after_delay(now, last, delay_days)
            }
        }
    }

    /// Nominal cadence implied by this schedule
    pub fn cadence(&self) -> Cadence {
        match self {
            Schedule::Daily => Cadence::Daily,
            Schedule::Weekly => Cadence::Weekly,
            Schedule::Monthly => Cadence::Monthly,
            Schedule::AnnualAfterRelease { .. } => Cadence::Annual,
            Schedule::QuarterlyWithLag { .. } | Schedule::QuarterlyAfterDelay { .. } => {
                Cadence::Quarterly
            }
        }
    }

    /// Reject parameters no calendar can satisfy
    pub fn validate(&self) -> Result<()> {
        if let Schedule::AnnualAfterRelease { month } = self {
            if !(1..=12).contains(month) {
                return Err(Error::invalid_value(
                    "schedule.month",
                    format!("release month must be 1-12, got {month}"),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Daily => write!(f, "daily"),
            Schedule::Weekly => write!(f, "weekly"),
            Schedule::Monthly => write!(f, "monthly"),
            Schedule::AnnualAfterRelease { month } => {
                write!(f, "annual after release (month {month})")
            }
            Schedule::QuarterlyWithLag { lag_months } => {
                write!(f, "quarterly + {lag_months} months")
            }
            Schedule::QuarterlyAfterDelay { delay_days } => {
                write!(f, "quarterly + {delay_days} days")
            }
        }
    }
}
