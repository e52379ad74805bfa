//! Registered schedule/job pairs.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::job::Job;
use crate::schedule::Schedule;

/// Identifies an entry within one scheduler instance.
///
/// Ids are assigned monotonically starting at 1 and stay stable for the
/// entry's lifetime; 0 is never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A schedule and the job to run on it.
#[derive(Clone)]
pub struct Entry {
    pub id: EntryId,

    /// The schedule on which the job should run.
    pub schedule: Arc<dyn Schedule>,

    /// The job as decorated by the scheduler's wrapper chain; this is what
    /// the dispatcher invokes.
    pub wrapped_job: Arc<dyn Job>,

    /// The job as submitted, kept for inspection.
    pub job: Arc<dyn Job>,

    /// The next activation instant, or `None` when the schedule is
    /// unsatisfiable or the entry has not been scheduled yet.
    pub next: Option<DateTime<Utc>>,

    /// The last activation instant, or `None` when the entry never ran.
    pub prev: Option<DateTime<Utc>>,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .finish_non_exhaustive()
    }
}
