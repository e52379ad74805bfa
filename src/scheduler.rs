//! The scheduler façade and its dispatcher loop.
//!
//! [`Cron`] keeps track of any number of entries, invoking the associated
//! job as specified by its schedule. It may be started, stopped, and the
//! entries may be inspected while running.
//!
//! One dispatcher task owns the timer: it sleeps until the soonest entry is
//! due, spawns every due job on its own task, records `prev`/`next`, and
//! re-arms. Entry mutations wake it through a level-triggered change
//! signal; the armed sleep is always dropped and a fresh one armed, never
//! reset in place.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Notify};

use crate::chain::Chain;
use crate::clock::{Clock, SystemClock};
use crate::entry::{Entry, EntryId};
use crate::error::Result;
use crate::job::{FuncJob, Job};
use crate::logger::{default_logger, Logger};
use crate::parser::Parser;
use crate::schedule::Schedule;
use crate::store::EntryStore;
use crate::timezone::Location;

const STATE_IDLE: u8 = 0;
const STATE_RUNNING: u8 = 1;
const STATE_STOPPED: u8 = 2;

/// Timer value when no entry is schedulable; the change signal is what
/// actually ends the wait.
const PARKED: Duration = Duration::from_secs(100_000 * 3600);

struct Inner {
    store: EntryStore,
    chain: Chain,
    parser: Parser,
    location: Location,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    state: AtomicU8,
    next_id: AtomicU64,
    /// Level-triggered "entries changed" signal: one pending wakeup is
    /// enough no matter how many mutations happened.
    changed: Notify,
    stop: Notify,
    inflight: AtomicUsize,
    idle: Notify,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Inner {
    /// Resolves once every spawned job task has finished.
    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register as a waiter before reading the count: the signal
            // comes from `notify_waiters`, which stores no permit, so a
            // final decrement landing between the load and the first poll
            // would otherwise be lost.
            notified.as_mut().enable();
            if self.inflight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// An in-process cron scheduler.
///
/// `Cron` is a cheap handle (`Clone` shares the same scheduler). Build one
/// with [`Cron::new`] or [`Cron::builder`], register jobs with
/// [`add_job`](Cron::add_job) / [`add_fn`](Cron::add_fn) /
/// [`schedule`](Cron::schedule), and start the dispatcher with
/// [`start`](Cron::start) (spawned) or [`run`](Cron::run) (on the calling
/// task). Jobs may be added and removed at any time, before or while
/// running.
#[derive(Clone)]
pub struct Cron {
    inner: Arc<Inner>,
}

impl Cron {
    /// A scheduler with the default configuration: standard five-field
    /// parser, process-local timezone, empty wrapper chain, tracing-backed
    /// logger, system clock.
    pub fn new() -> Cron {
        Cron::builder().build()
    }

    pub fn builder() -> CronBuilder {
        CronBuilder::default()
    }

    /// Parses a spec with the configured parser and registers the job.
    ///
    /// On a parse error nothing is registered. The entry's first activation
    /// is computed from the scheduler clock's now, so a freshly added entry
    /// never fires for an occurrence that predates its registration.
    pub fn add_job<J: Job>(&self, spec: &str, job: J) -> Result<EntryId> {
        let schedule = self.inner.parser.parse_in(spec, self.inner.location)?;
        Ok(self.register(schedule, Arc::new(job)))
    }

    /// [`add_job`](Cron::add_job) for a plain async closure.
    pub fn add_fn<F, Fut>(&self, spec: &str, f: F) -> Result<EntryId>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_job(spec, FuncJob::new(f))
    }

    /// Registers a job against a pre-built schedule.
    pub fn schedule<S: Schedule, J: Job>(&self, schedule: S, job: J) -> EntryId {
        self.register(Arc::new(schedule), Arc::new(job))
    }

    fn register(&self, schedule: Arc<dyn Schedule>, job: Arc<dyn Job>) -> EntryId {
        let id = EntryId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let wrapped_job = self.inner.chain.then(job.clone());
        let next = schedule.next(self.inner.clock.now());

        let next_text = display_next(next);
        self.inner.logger.info(
            "schedule",
            &[
                ("entry", &id as &dyn fmt::Display),
                ("next", &next_text as &dyn fmt::Display),
            ],
        );

        self.inner.store.register(Entry {
            id,
            schedule,
            wrapped_job,
            job,
            next,
            prev: None,
        });
        self.inner.changed.notify_one();
        id
    }

    /// Removes an entry from being run in the future.
    ///
    /// An activation already handed to its task keeps running to
    /// completion; no new activations occur.
    pub fn remove(&self, id: EntryId) {
        self.inner.store.remove(id);
        self.inner
            .logger
            .info("removed", &[("entry", &id as &dyn fmt::Display)]);
        self.inner.changed.notify_one();
    }

    /// A snapshot of all entries, soonest `next` first, never-firing
    /// entries last.
    pub fn entries(&self) -> Vec<Entry> {
        self.inner.store.snapshot()
    }

    /// A snapshot of one entry, or `None` when absent.
    pub fn entry(&self, id: EntryId) -> Option<Entry> {
        self.inner.store.entry(id)
    }

    /// The scheduler's default timezone.
    pub fn location(&self) -> Location {
        self.inner.location
    }

    /// Starts the dispatcher on its own task. No-op when already running
    /// or stopped. Must be called within a tokio runtime.
    pub fn start(&self) {
        if self.transition_to_running() {
            let inner = self.inner.clone();
            tokio::spawn(dispatch(inner));
        }
    }

    /// Runs the dispatcher on the calling task until [`stop`](Cron::stop).
    /// No-op when already running or stopped.
    pub async fn run(&self) {
        if self.transition_to_running() {
            dispatch(self.inner.clone()).await;
        }
    }

    /// Stops the scheduler if it is running.
    ///
    /// The returned handle resolves once the dispatcher has exited and
    /// every in-flight job has finished. Stopping an idle or already
    /// stopped scheduler is a no-op; re-starting after a stop is not
    /// supported.
    pub fn stop(&self) -> StopHandle {
        if self
            .inner
            .state
            .compare_exchange(
                STATE_RUNNING,
                STATE_STOPPED,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            self.inner.stop.notify_one();
        }

        if self.inner.state.load(Ordering::SeqCst) == STATE_STOPPED {
            StopHandle {
                rx: Some(self.inner.done_rx.clone()),
            }
        } else {
            StopHandle { rx: None }
        }
    }

    fn transition_to_running(&self) -> bool {
        self.inner
            .state
            .compare_exchange(
                STATE_IDLE,
                STATE_RUNNING,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }
}

impl Default for Cron {
    fn default() -> Self {
        Cron::new()
    }
}

impl fmt::Debug for Cron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cron")
            .field("entries", &self.inner.store.len())
            .field("location", &self.inner.location)
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`Cron::stop`]; resolves once all in-flight jobs
/// have drained.
pub struct StopHandle {
    rx: Option<watch::Receiver<bool>>,
}

impl StopHandle {
    pub async fn wait(mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let _ = rx.wait_for(|done| *done).await;
        }
    }
}

/// Configuration for a [`Cron`] instance.
pub struct CronBuilder {
    location: Location,
    parser: Parser,
    chain: Chain,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
}

impl Default for CronBuilder {
    fn default() -> Self {
        CronBuilder {
            location: Location::Local,
            parser: Parser::standard(),
            chain: Chain::default(),
            logger: default_logger(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl CronBuilder {
    /// Default timezone for specs without a `TZ=` prefix.
    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    /// Custom spec parser.
    pub fn parser(mut self, parser: Parser) -> Self {
        self.parser = parser;
        self
    }

    /// Wrapper chain applied to every job at registration.
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shorthand for the six-field parser with a REQUIRED seconds field.
    /// Install [`Parser::seconds_optional`] via [`parser`](Self::parser)
    /// for the optional-seconds dialect.
    pub fn seconds(self) -> Self {
        self.parser(Parser::with_seconds())
    }

    pub fn build(self) -> Cron {
        let (done_tx, done_rx) = watch::channel(false);
        Cron {
            inner: Arc::new(Inner {
                store: EntryStore::new(),
                chain: self.chain,
                parser: self.parser,
                location: self.location,
                logger: self.logger,
                clock: self.clock,
                state: AtomicU8::new(STATE_IDLE),
                next_id: AtomicU64::new(1),
                changed: Notify::new(),
                stop: Notify::new(),
                inflight: AtomicUsize::new(0),
                idle: Notify::new(),
                done_tx,
                done_rx,
            }),
        }
    }
}

async fn dispatch(inner: Arc<Inner>) {
    inner.logger.info("start", &[]);

    loop {
        let now = inner.clock.now();
        let armed = inner.store.next().map(|(_, next)| next);
        let sleep_for = match armed {
            Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
            None => PARKED,
        };

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {
                // The fire instant is the clock's reading at the wake, never
                // earlier than the armed target. When the wake arrives late
                // (clock jump, machine sleep), overdue entries are classified
                // at the current reading, so missed occurrences collapse into
                // a single firing instead of being replayed one by one.
                let fire = match armed {
                    Some(armed) => inner.clock.now().max(armed),
                    None => inner.clock.now(),
                };
                let fire_text = fire.to_rfc3339();
                inner
                    .logger
                    .info("wake", &[("now", &fire_text as &dyn fmt::Display)]);

                for entry in inner.store.ready(fire) {
                    spawn_job(&inner, &entry);
                    let next = entry.schedule.next(fire);
                    inner.store.update(entry.id, |e| {
                        e.prev = e.next;
                        e.next = next;
                    });
                    let next_text = display_next(next);
                    inner.logger.info(
                        "run",
                        &[
                            ("entry", &entry.id as &dyn fmt::Display),
                            ("next", &next_text as &dyn fmt::Display),
                        ],
                    );
                }
            }
            _ = inner.changed.notified() => {}
            _ = inner.stop.notified() => break,
        }
    }

    inner.wait_idle().await;
    inner.logger.info("stop", &[]);
    let _ = inner.done_tx.send(true);
}

fn spawn_job(inner: &Arc<Inner>, entry: &Entry) {
    inner.inflight.fetch_add(1, Ordering::SeqCst);
    let job = entry.wrapped_job.clone();
    let guard = InflightGuard(inner.clone());
    tokio::spawn(async move {
        let _guard = guard;
        job.run().await;
    });
}

/// Decrements the in-flight count when the job task ends, panicking or not.
struct InflightGuard(Arc<Inner>);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.0.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

fn display_next(next: Option<DateTime<Utc>>) -> String {
    match next {
        Some(next) => next.to_rfc3339(),
        None => "never".to_string(),
    }
}
