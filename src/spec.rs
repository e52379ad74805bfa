//! Crontab duty cycles stored as per-field bit sets.
//!
//! A [`SpecSchedule`] is the compiled form of a crontab expression: one bit
//! set per calendar field, an optional year set, the optional last-day /
//! nth-weekday extensions, and the location the wall-clock fields are
//! evaluated in. Field values are matched against local time; stepping
//! through candidate instants happens in absolute time, so transitions that
//! repeat or delete a local hour are observed the way a wall clock would
//! show them.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::schedule::Schedule;
use crate::timezone::{resolve_forward_in, Location};

/// Bit set over one calendar field, plus the star flag recording whether
/// the source expression was unrestricted (`*` / `?`). The flag drives the
/// day-of-month / day-of-week interaction rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldSet {
    bits: u64,
    star: bool,
}

impl FieldSet {
    pub(crate) const fn new(bits: u64, star: bool) -> Self {
        FieldSet { bits, star }
    }

    pub(crate) fn contains(&self, value: u32) -> bool {
        value < 64 && self.bits & (1u64 << value) != 0
    }

    pub(crate) fn star(&self) -> bool {
        self.star
    }

    pub(crate) fn bits(&self) -> u64 {
        self.bits
    }
}

pub(crate) const YEAR_MIN: i32 = 1970;
pub(crate) const YEAR_MAX: i32 = 2097;

/// Year field bit set, offset so 1970 is bit zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct YearSet {
    bits: u128,
    star: bool,
}

impl YearSet {
    pub(crate) const fn new(bits: u128, star: bool) -> Self {
        YearSet { bits, star }
    }

    pub(crate) fn contains(&self, year: i32) -> bool {
        (YEAR_MIN..=YEAR_MAX).contains(&year) && self.bits & (1u128 << (year - YEAR_MIN)) != 0
    }

    pub(crate) fn star(&self) -> bool {
        self.star
    }
}

/// `<dow>#<n>` day-of-week extension: the nth (or last) occurrence of a
/// weekday within the month.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct NthDow {
    pub(crate) dow: u32,
    pub(crate) nth: Nth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Nth {
    Nth(u8),
    Last,
}

impl NthDow {
    fn matches<T: Datelike>(&self, t: &T) -> bool {
        if t.weekday().num_days_from_sunday() != self.dow {
            return false;
        }
        match self.nth {
            Nth::Last => t.day() + 7 > days_in_month(t.year(), t.month()),
            Nth::Nth(n) => (t.day() - 1) / 7 + 1 == u32::from(n),
        }
    }
}

/// A crontab duty cycle, to second granularity.
#[derive(Debug, Clone)]
pub struct SpecSchedule {
    pub(crate) second: FieldSet,
    pub(crate) minute: FieldSet,
    pub(crate) hour: FieldSet,
    pub(crate) dom: FieldSet,
    pub(crate) month: FieldSet,
    pub(crate) dow: FieldSet,
    pub(crate) year: Option<YearSet>,
    /// `L` in the day-of-month field: last day of the month.
    pub(crate) dom_last: bool,
    pub(crate) nth_dow: Option<NthDow>,
    pub(crate) location: Location,
    /// The spec string this schedule was parsed from, kept for debugging.
    pub(crate) source: String,
}

impl SpecSchedule {
    /// The spec string this schedule was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn location(&self) -> Location {
        self.location
    }

    fn next_in_zone<Z: TimeZone>(&self, tz: &Z, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        // General approach: check each field from coarse to fine. A
        // non-matching field is stepped forward one unit at a time, resetting
        // the finer fields to their minimum on the first such step; a step
        // that wraps its field re-enters the whole check from the top, since
        // coarser fields may have changed.
        let local = after.with_timezone(tz);

        // Start at the first whole second strictly after the input.
        let nanos = i64::from(after.timestamp_subsec_nanos().min(999_999_999));
        let mut t = local + Duration::nanoseconds(1_000_000_000 - nanos);

        // A restricted year field bounds the search by itself; otherwise
        // give up after five years.
        let year_limit = match &self.year {
            Some(years) if !years.star() => YEAR_MAX,
            _ => t.year() + 5,
        };

        let mut added = false;

        'wrap: loop {
            if t.year() > year_limit {
                return None;
            }

            if let Some(years) = &self.year {
                while !years.contains(t.year()) {
                    added = true;
                    if t.year() >= YEAR_MAX {
                        return None;
                    }
                    t = first_of_year(tz, t.year() + 1)?;
                }
            }

            while !self.month.contains(t.month()) {
                if !added {
                    added = true;
                    t = start_of_month(tz, &t)?;
                }
                t = next_month(tz, &t)?;
                if t.month() == 1 {
                    continue 'wrap;
                }
            }

            while !self.day_matches(&t) {
                if !added {
                    added = true;
                    t = start_of_day(tz, &t)?;
                }
                // Day stepping lands on local midnight; on days where a
                // transition deletes midnight, the first existing instant
                // after the gap is used instead.
                t = next_day(tz, &t)?;
                if t.day() == 1 {
                    continue 'wrap;
                }
            }

            while !self.hour.contains(t.hour()) {
                if !added {
                    added = true;
                    t = truncate_to_hour(t);
                }
                t = t + Duration::hours(1);
                if t.hour() == 0 {
                    continue 'wrap;
                }
            }

            while !self.minute.contains(t.minute()) {
                if !added {
                    added = true;
                    t = truncate_to_minute(t);
                }
                t = t + Duration::minutes(1);
                if t.minute() == 0 {
                    continue 'wrap;
                }
            }

            while !self.second.contains(t.second()) {
                added = true;
                t = t + Duration::seconds(1);
                if t.second() == 0 {
                    continue 'wrap;
                }
            }

            return Some(t.with_timezone(&Utc));
        }
    }

    /// Day-of-month / day-of-week interaction: when both fields are
    /// restricted, a day matches if EITHER matches (traditional cron);
    /// otherwise both must match. The `L` and `#` extensions participate as
    /// the restricted side of their field.
    fn day_matches<T: Datelike>(&self, t: &T) -> bool {
        let dom_match = if self.dom_last {
            t.day() == days_in_month(t.year(), t.month())
        } else {
            self.dom.contains(t.day())
        };
        let dow_match = match &self.nth_dow {
            Some(nth) => nth.matches(t),
            None => self.dow.contains(t.weekday().num_days_from_sunday()),
        };

        if self.dom.star() || self.dow.star() {
            dom_match && dow_match
        } else {
            dom_match || dow_match
        }
    }
}

impl Schedule for SpecSchedule {
    fn next(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.location {
            Location::Local => self.next_in_zone(&chrono::Local, after),
            Location::Zone(tz) => self.next_in_zone(&tz, after),
        }
    }
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

fn first_of_year<Z: TimeZone>(tz: &Z, year: i32) -> Option<DateTime<Z>> {
    resolve_forward_in(tz, NaiveDate::from_ymd_opt(year, 1, 1)?.and_hms_opt(0, 0, 0)?)
}

fn start_of_month<Z: TimeZone>(tz: &Z, t: &DateTime<Z>) -> Option<DateTime<Z>> {
    resolve_forward_in(
        tz,
        NaiveDate::from_ymd_opt(t.year(), t.month(), 1)?.and_hms_opt(0, 0, 0)?,
    )
}

fn next_month<Z: TimeZone>(tz: &Z, t: &DateTime<Z>) -> Option<DateTime<Z>> {
    let (y, m) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    resolve_forward_in(tz, NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)?)
}

fn start_of_day<Z: TimeZone>(tz: &Z, t: &DateTime<Z>) -> Option<DateTime<Z>> {
    resolve_forward_in(tz, t.date_naive().and_hms_opt(0, 0, 0)?)
}

fn next_day<Z: TimeZone>(tz: &Z, t: &DateTime<Z>) -> Option<DateTime<Z>> {
    resolve_forward_in(tz, t.date_naive().succ_opt()?.and_hms_opt(0, 0, 0)?)
}

fn truncate_to_hour<Z: TimeZone>(t: DateTime<Z>) -> DateTime<Z> {
    let sub = i64::from(t.minute()) * 60_000_000_000
        + i64::from(t.second()) * 1_000_000_000
        + i64::from(t.timestamp_subsec_nanos().min(999_999_999));
    t - Duration::nanoseconds(sub)
}

fn truncate_to_minute<Z: TimeZone>(t: DateTime<Z>) -> DateTime<Z> {
    let sub = i64::from(t.second()) * 1_000_000_000
        + i64::from(t.timestamp_subsec_nanos().min(999_999_999));
    t - Duration::nanoseconds(sub)
}
