//! Due/not-due predicates
//!
//! Every function maps `(now, last successful sync)` to a boolean. They are
//! total and pure: no I/O, no clock reads, no hidden state. A dataset that
//! has never synced (`last == None`) is always due.
//!
//! All calendar arithmetic happens on UTC dates.

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};

/// Due once per UTC calendar day.
pub fn daily(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> bool {
    let Some(last) = last else {
        return true;
    };
    last.date_naive() < now.date_naive()
}

/// Due once per Monday-start week.
///
/// A Sunday belongs to the week that started on the preceding Monday.
pub fn weekly(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> bool {
    let Some(last) = last else {
        return true;
    };
    week_start(last.date_naive()) < week_start(now.date_naive())
}

/// Due once per calendar month.
pub fn monthly(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> bool {
    let Some(last) = last else {
        return true;
    };
    (last.year(), last.month()) < (now.year(), now.month())
}

/// Due once a year, after the new vintage is released on the first of
/// `release_month`.
///
/// Before the release month of the current year this is never due, however
/// old `last` is. An out-of-range month never becomes due.
pub fn annual_after_release(
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    release_month: u32,
) -> bool {
    let Some(last) = last else {
        return true;
    };
    if now.month() < release_month {
        return false;
    }
    let Some(release) = NaiveDate::from_ymd_opt(now.year(), release_month, 1) else {
        return false;
    };
    last < start_of_day(release)
}

/// Due when a completed quarter's data has been public for `lag_months`
/// and the last sync predates that availability.
///
/// Month addition clamps to the end of the target month, so a September 30
/// quarter end with a five month lag becomes available on the last day of
/// February.
pub fn quarterly_with_lag(
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    lag_months: u32,
) -> bool {
    quarterly_due(now, last, |quarter_end| {
        quarter_end
            .checked_add_months(Months::new(lag_months))
            .unwrap_or(NaiveDate::MAX)
    })
}

/// Same as [`quarterly_with_lag`] with the lag expressed in days.
pub fn quarterly_after_delay(
    now: DateTime<Utc>,
    last: Option<DateTime<Utc>>,
    delay_days: u32,
) -> bool {
    quarterly_due(now, last, |quarter_end| {
        quarter_end
            .checked_add_days(Days::new(u64::from(delay_days)))
            .unwrap_or(NaiveDate::MAX)
    })
}

/// Shared quarterly walk: look at the latest quarter end on or before `now`
/// and, if its data is not available yet, at the quarter before it.
fn quarterly_due<F>(now: DateTime<Utc>, last: Option<DateTime<Utc>>, available_on: F) -> bool
where
    F: Fn(NaiveDate) -> NaiveDate,
{
    let Some(last) = last else {
        return true;
    };

    let mut quarter_end = latest_quarter_end(now.date_naive());
    for _ in 0..2 {
        let available = start_of_day(available_on(quarter_end));
        if now >= available {
            return last < available;
        }
        quarter_end = previous_quarter_end(quarter_end);
    }
    false
}

/// Monday of the week containing `date`
pub(crate) fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Most recent quarter end (Mar 31, Jun 30, Sep 30, Dec 31) on or before `date`
pub(crate) fn latest_quarter_end(date: NaiveDate) -> NaiveDate {
    let quarter_month = (date.month() - 1) / 3 * 3 + 3;
    let end = quarter_end(date.year(), quarter_month);
    if end <= date {
        end
    } else {
        previous_quarter_end(end)
    }
}

fn previous_quarter_end(end: NaiveDate) -> NaiveDate {
    if end.month() == 3 {
        quarter_end(end.year() - 1, 12)
    } else {
        quarter_end(end.year(), end.month() - 3)
    }
}

fn quarter_end(year: i32, month: u32) -> NaiveDate {
    let day = match month {
        3 | 12 => 31,
        _ => 30,
    };
    NaiveDate::from_ymd_opt(year, month, day).expect("quarter end months are 3, 6, 9 or 12")
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
