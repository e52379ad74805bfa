//! The schedule capability and the non-crontab schedule kinds.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};

use crate::spec::days_in_month;
use crate::timezone::Location;

/// A job's duty cycle.
///
/// `next` returns the next activation instant strictly after `after`, or
/// `None` when the schedule can never activate again. It must be pure and
/// monotone: `t1 <= t2` implies `next(t1) <= next(t2)`.
pub trait Schedule: Send + Sync + 'static {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>>;
}

impl<S: Schedule + ?Sized> Schedule for Arc<S> {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        (**self).next(after)
    }
}

impl std::fmt::Debug for dyn Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Schedule")
    }
}

/// A simple recurring duty cycle, e.g. "every 5 minutes".
///
/// Delays shorter than one second are rounded up to one second, and
/// sub-second remainders are truncated: jobs more frequent than once a
/// second are not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay {
    delay: StdDuration,
}

impl ConstantDelay {
    pub fn new(delay: StdDuration) -> Self {
        let secs = delay.as_secs().max(1);
        ConstantDelay {
            delay: StdDuration::from_secs(secs),
        }
    }

    pub fn delay(&self) -> StdDuration {
        self.delay
    }
}

impl Schedule for ConstantDelay {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let delay = Duration::from_std(self.delay).ok()?;
        // Activations land on whole seconds.
        (after + delay).with_nanosecond(0)
    }
}

/// Runs once immediately when first asked, then follows the inner schedule.
pub struct OnStartup<S> {
    inner: S,
    started: AtomicBool,
}

impl<S: Schedule> OnStartup<S> {
    pub fn new(inner: S) -> Self {
        OnStartup {
            inner,
            started: AtomicBool::new(false),
        }
    }
}

impl<S: Schedule> Schedule for OnStartup<S> {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.started.swap(true, Ordering::SeqCst) {
            // Deliberately impure: the very first activation is "now", which
            // the dispatcher treats as already due.
            return Some(Utc::now());
        }
        self.inner.next(after)
    }
}

/// Midnight on the last day of each month, evaluated in a location.
#[derive(Debug, Clone, Copy, Default)]
pub struct EndOfMonth {
    location: Location,
}

impl EndOfMonth {
    pub fn new(location: Location) -> Self {
        EndOfMonth { location }
    }
}

impl Schedule for EndOfMonth {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = self.location.naive_local(after);
        let (year, month, day) = (local.year(), local.month(), local.day());

        let last = days_in_month(year, month);
        let (target_year, target_month) = if day >= last {
            // Already on (or past) this month's last day; jump to the next
            // month's last day.
            if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            }
        } else {
            (year, month)
        };

        let target_day = days_in_month(target_year, target_month);
        let midnight = chrono::NaiveDate::from_ymd_opt(target_year, target_month, target_day)?
            .and_hms_opt(0, 0, 0)?;
        self.location.resolve_forward(midnight)
    }
}

/// A single activation at a fixed instant; `next` is `None` once the
/// instant has passed, so the job fires at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fixed {
    instant: DateTime<Utc>,
}

impl Fixed {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Fixed { instant }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

impl Schedule for Fixed {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.instant > after {
            Some(self.instant)
        } else {
            None
        }
    }
}
