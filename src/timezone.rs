//! Timezone resolution for schedules.
//!
//! A schedule evaluates wall-clock fields in a [`Location`]: either the
//! process-local zone or a named IANA zone from the `TZ=` / `CRON_TZ=`
//! spec prefix. `Local` is resolved at every `next` call, so a schedule
//! built in one zone keeps following the process zone if it changes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::Error;

/// The timezone a schedule's wall-clock fields are evaluated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// The process-local zone at the moment of each `next` call.
    Local,
    /// A fixed named IANA zone, e.g. `America/New_York`.
    Zone(Tz),
}

impl Location {
    /// Coordinated Universal Time.
    pub const UTC: Location = Location::Zone(chrono_tz::UTC);

    /// Local wall-clock reading of a UTC instant in this location.
    pub(crate) fn naive_local(&self, t: DateTime<Utc>) -> NaiveDateTime {
        match self {
            Location::Local => t.with_timezone(&chrono::Local).naive_local(),
            Location::Zone(tz) => t.with_timezone(tz).naive_local(),
        }
    }

    /// Earliest UTC instant whose local reading is at or after `naive`.
    ///
    /// A wall-clock time inside a spring-forward gap does not exist; the
    /// result is then the first instant after the gap. A time repeated by a
    /// fall-back transition maps to its earliest occurrence.
    pub(crate) fn resolve_forward(&self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            Location::Local => {
                resolve_forward_in(&chrono::Local, naive).map(|t| t.with_timezone(&Utc))
            }
            Location::Zone(tz) => resolve_forward_in(tz, naive).map(|t| t.with_timezone(&Utc)),
        }
    }
}

/// See [`Location::resolve_forward`]; generic over the zone so the spec
/// search can work directly in `DateTime<Z>`.
pub(crate) fn resolve_forward_in<Z: TimeZone>(
    tz: &Z,
    naive: NaiveDateTime,
) -> Option<DateTime<Z>> {
    let mut naive = naive;
    // Transition gaps top out at a couple of hours; 30-minute probing covers
    // the half-hour zones without overshooting whole-hour gaps.
    for _ in 0..8 {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(t) => return Some(t),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest),
            LocalResult::None => naive += Duration::minutes(30),
        }
    }
    None
}

impl Default for Location {
    fn default() -> Self {
        Location::Local
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "Local" {
            return Ok(Location::Local);
        }
        s.parse::<Tz>()
            .map(Location::Zone)
            .map_err(|_| Error::InvalidTimezone(s.to_string()))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local => f.write_str("Local"),
            Location::Zone(tz) => f.write_str(tz.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_named_zone() {
        let loc: Location = "America/New_York".parse().unwrap();
        assert_eq!(loc, Location::Zone(chrono_tz::America::New_York));
    }

    #[test]
    fn parses_utc() {
        let loc: Location = "UTC".parse().unwrap();
        assert_eq!(loc, Location::UTC);
    }

    #[test]
    fn parses_local_keyword() {
        let loc: Location = "Local".parse().unwrap();
        assert_eq!(loc, Location::Local);
    }

    #[test]
    fn rejects_unknown_zone() {
        let err = "Not/AZone".parse::<Location>().unwrap_err();
        assert!(err.to_string().contains("bad location"));
    }

    #[test]
    fn display_round_trips() {
        assert_eq!(Location::Local.to_string(), "Local");
        assert_eq!(
            Location::Zone(chrono_tz::Europe::London).to_string(),
            "Europe/London"
        );
    }

    #[test]
    fn resolve_forward_skips_spring_gap() {
        // 2012-03-11 02:30 does not exist in New York; the first instant
        // after the gap is 03:00 EDT.
        let loc = Location::Zone(chrono_tz::America::New_York);
        let naive = chrono::NaiveDate::from_ymd_opt(2012, 3, 11)
            .unwrap()
            .and_hms_opt(2, 30, 0)
            .unwrap();
        let resolved = loc.resolve_forward(naive).unwrap();
        let local = loc.naive_local(resolved);
        assert_eq!(local.hour(), 3);
        assert_eq!(local.minute(), 0);
    }

    #[test]
    fn resolve_forward_prefers_earliest_on_fall_back() {
        // 2012-11-04 01:30 occurs twice in New York; the earliest mapping
        // (EDT, -04:00) wins.
        let loc = Location::Zone(chrono_tz::America::New_York);
        let naive = chrono::NaiveDate::from_ymd_opt(2012, 11, 4)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = loc.resolve_forward(naive).unwrap();
        let expected = Utc.with_ymd_and_hms(2012, 11, 4, 5, 30, 0).unwrap();
        assert_eq!(resolved, expected);
    }
}
