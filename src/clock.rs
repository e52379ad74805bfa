//! Clock seam.
//!
//! The scheduler reads "now" through the [`Clock`] capability rather than
//! calling `Utc::now()` directly, so tests can pin registration instants.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Time source used by the scheduler.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Real clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to an instant; advances only when told to.
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(RwLock::new(time)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.write() = time;
    }

    pub fn advance(&self, duration: chrono::Duration) {
        let mut t = self.time.write();
        *t += duration;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn system_clock_tracks_real_time() {
        let now = SystemClock.now();
        let diff = (Utc::now() - now).num_seconds().abs();
        assert!(diff < 2);
    }

    #[test]
    fn fixed_clock_holds_and_advances() {
        let t0 = Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now(), t0);

        clock.advance(chrono::Duration::minutes(90));
        assert_eq!(clock.now(), t0 + chrono::Duration::minutes(90));

        let t1 = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        clock.set(t1);
        assert_eq!(clock.now(), t1);
    }
}
