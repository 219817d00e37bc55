// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Time-Window Calculator
//!
//! Computes the trace window a recurring monitor run evaluates.
//!
//! ```text
//!   start = next_run_time - interval
//!   end   = now - safety_delta          (safety_delta = ceil(5% of interval) minutes)
//!   next  = end + interval
//! ```
//!
//! The window ends before `now` so traces that have not been ingested yet are
//! left for the following run. Anchoring `start` on the due instant rather than
//! on `now` keeps consecutive windows contiguous regardless of how late the
//! scheduler picked the monitor up.
//!
//! All three instants are truncated to whole seconds, the precision of the
//! timestamps handed to the workflow plane.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use thiserror::Error;

/// Share of the interval held back from the end of every window.
pub const SAFETY_DELTA_PERCENT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub next_run_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeWindowError {
    #[error("interval_minutes is nil")]
    MissingInterval,

    #[error("next_run_time is nil")]
    MissingNextRunTime,

    #[error("interval_minutes must be positive, got {0}")]
    InvalidInterval(i32),
}

/// Trailing buffer for a given interval, rounded up to whole minutes.
pub fn safety_delta(interval_minutes: i32) -> Duration {
    let interval = i64::from(interval_minutes.max(0));
    Duration::minutes((interval * SAFETY_DELTA_PERCENT + 99) / 100)
}

pub fn calculate_time_window(
    next_run_time: Option<DateTime<Utc>>,
    interval_minutes: Option<i32>,
    now: DateTime<Utc>,
) -> Result<TimeWindow, TimeWindowError> {
    let interval_minutes = interval_minutes.ok_or(TimeWindowError::MissingInterval)?;
    let next_run_time = next_run_time.ok_or(TimeWindowError::MissingNextRunTime)?;
    if interval_minutes <= 0 {
        return Err(TimeWindowError::InvalidInterval(interval_minutes));
    }

    let interval = Duration::minutes(i64::from(interval_minutes));
    let end_time = (now - safety_delta(interval_minutes)).trunc_subsecs(0);

    Ok(TimeWindow {
        start_time: (next_run_time - interval).trunc_subsecs(0),
        end_time,
        next_run_time: end_time + interval,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_hundred_minute_interval() {
        let now = at(12, 3);
        let window = calculate_time_window(Some(at(12, 0)), Some(100), now).unwrap();

        assert_eq!(window.start_time, at(10, 20));
        assert_eq!(window.end_time, at(11, 58));
        assert_eq!(window.next_run_time, at(13, 38));
    }

    #[test]
    fn test_start_is_anchored_on_due_time() {
        let due = at(12, 0);
        for lag_minutes in [0, 1, 17, 240] {
            let now = due + Duration::minutes(lag_minutes);
            let window = calculate_time_window(Some(due), Some(30), now).unwrap();
            assert_eq!(window.start_time, due - Duration::minutes(30));
        }
    }

    #[test]
    fn test_end_never_reaches_into_unsafe_tail() {
        let now = at(12, 0);
        for interval in [5, 7, 10, 19, 20, 60, 100, 1440] {
            let window = calculate_time_window(Some(now), Some(interval), now).unwrap();
            let unsafe_tail_ms = i64::from(interval) * 60_000 * SAFETY_DELTA_PERCENT / 100;
            assert!(
                window.end_time <= now - Duration::milliseconds(unsafe_tail_ms),
                "interval {} produced end {}",
                interval,
                window.end_time
            );
            assert_eq!(
                window.next_run_time,
                window.end_time + Duration::minutes(i64::from(interval))
            );
        }
    }

    #[test]
    fn test_window_is_whole_seconds_and_contiguous() {
        let due = at(12, 0) + Duration::milliseconds(431);
        let now = at(12, 3) + Duration::microseconds(750_250);

        let first = calculate_time_window(Some(due), Some(10), now).unwrap();
        assert_eq!(first.start_time, at(11, 50));
        assert_eq!(first.end_time, at(12, 2));
        assert_eq!(first.next_run_time, at(12, 12));

        let later = first.next_run_time + Duration::milliseconds(1_200);
        let second = calculate_time_window(Some(first.next_run_time), Some(10), later).unwrap();
        assert_eq!(second.start_time, first.end_time);
    }

    #[test]
    fn test_safety_delta_rounds_up() {
        assert_eq!(safety_delta(100), Duration::minutes(5));
        assert_eq!(safety_delta(60), Duration::minutes(3));
        assert_eq!(safety_delta(5), Duration::minutes(1));
        assert_eq!(safety_delta(21), Duration::minutes(2));
    }

    #[test]
    fn test_missing_interval() {
        let err = calculate_time_window(Some(at(12, 0)), None, at(12, 0)).unwrap_err();
        assert_eq!(err, TimeWindowError::MissingInterval);
        assert!(err.to_string().contains("interval_minutes is nil"));
    }

    #[test]
    fn test_missing_next_run_time() {
        let err = calculate_time_window(None, Some(60), at(12, 0)).unwrap_err();
        assert_eq!(err, TimeWindowError::MissingNextRunTime);
    }

    #[test]
    fn test_non_positive_interval() {
        let err = calculate_time_window(Some(at(12, 0)), Some(0), at(12, 0)).unwrap_err();
        assert_eq!(err, TimeWindowError::InvalidInterval(0));
    }
}
