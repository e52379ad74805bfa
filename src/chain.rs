//! Job wrappers: cross-cutting execution policies applied at registration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::{Mutex, Semaphore};

use crate::job::Job;
use crate::logger::Logger;

/// Decorates a [`Job`] with some behavior.
pub type JobWrapper = Arc<dyn Fn(Arc<dyn Job>) -> Arc<dyn Job> + Send + Sync>;

/// A sequence of [`JobWrapper`]s that decorates submitted jobs with
/// cross-cutting behaviors like logging or synchronization.
///
/// `Chain::new(vec![w1, w2, w3]).then(job)` is equivalent to
/// `w1(w2(w3(job)))`: the first wrapper is outermost.
#[derive(Clone, Default)]
pub struct Chain {
    wrappers: Vec<JobWrapper>,
}

impl Chain {
    pub fn new(wrappers: Vec<JobWrapper>) -> Self {
        Chain { wrappers }
    }

    /// Decorates the given job with all wrappers in the chain.
    pub fn then(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
        let mut job = job;
        for wrapper in self.wrappers.iter().rev() {
            job = wrapper(job);
        }
        job
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("wrappers", &self.wrappers.len())
            .finish()
    }
}

/// Rendered panic payloads and backtraces are capped at 64 KiB.
const STACK_CAP: usize = 64 << 10;

/// Catches a panic in the wrapped job and logs it with a backtrace through
/// the given logger. Without this wrapper, a panicking job takes down only
/// its own task; with it, the panic is reported and swallowed.
pub fn recover(logger: Arc<dyn Logger>) -> JobWrapper {
    Arc::new(move |job: Arc<dyn Job>| -> Arc<dyn Job> {
        Arc::new(RecoverJob {
            inner: job,
            logger: logger.clone(),
        })
    })
}

struct RecoverJob {
    inner: Arc<dyn Job>,
    logger: Arc<dyn Logger>,
}

impl Job for RecoverJob {
    fn run(&self) -> BoxFuture<'static, ()> {
        let fut = std::panic::AssertUnwindSafe(self.inner.run()).catch_unwind();
        let logger = self.logger.clone();
        Box::pin(async move {
            if let Err(payload) = fut.await {
                let message = panic_message(payload.as_ref());
                let stack = captured_backtrace();
                logger.error(&message, "panic", &[("stack", &stack as &dyn fmt::Display)]);
            }
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn captured_backtrace() -> String {
    let mut rendered = std::backtrace::Backtrace::force_capture().to_string();
    if rendered.len() > STACK_CAP {
        let mut cut = STACK_CAP;
        while !rendered.is_char_boundary(cut) {
            cut -= 1;
        }
        rendered.truncate(cut);
    }
    rendered
}

/// Skips an activation of the job if a previous activation is still
/// running. Skips are logged at info level.
pub fn skip_if_still_running(logger: Arc<dyn Logger>) -> JobWrapper {
    Arc::new(move |job: Arc<dyn Job>| -> Arc<dyn Job> {
        // One slot per wrapped job: distinct jobs never share it.
        Arc::new(SkipIfStillRunning {
            inner: job,
            logger: logger.clone(),
            slot: Arc::new(Semaphore::new(1)),
        })
    })
}

struct SkipIfStillRunning {
    inner: Arc<dyn Job>,
    logger: Arc<dyn Logger>,
    slot: Arc<Semaphore>,
}

impl Job for SkipIfStillRunning {
    fn run(&self) -> BoxFuture<'static, ()> {
        let inner = self.inner.clone();
        let logger = self.logger.clone();
        let slot = self.slot.clone();
        Box::pin(async move {
            match slot.try_acquire_owned() {
                Ok(_permit) => inner.run().await,
                Err(_) => logger.info("skip", &[]),
            }
        })
    }
}

/// Serializes activations of the job, delaying a run until the previous
/// one completes. Delays longer than a minute are logged at info level.
/// Queued activations acquire the lock in no guaranteed order.
pub fn delay_if_still_running(logger: Arc<dyn Logger>) -> JobWrapper {
    Arc::new(move |job: Arc<dyn Job>| -> Arc<dyn Job> {
        Arc::new(DelayIfStillRunning {
            inner: job,
            logger: logger.clone(),
            lock: Arc::new(Mutex::new(())),
        })
    })
}

struct DelayIfStillRunning {
    inner: Arc<dyn Job>,
    logger: Arc<dyn Logger>,
    lock: Arc<Mutex<()>>,
}

impl Job for DelayIfStillRunning {
    fn run(&self) -> BoxFuture<'static, ()> {
        let inner = self.inner.clone();
        let logger = self.logger.clone();
        let lock = self.lock.clone();
        Box::pin(async move {
            let start = tokio::time::Instant::now();
            let _guard = lock.lock().await;
            let waited = start.elapsed();
            if waited > Duration::from_secs(60) {
                let duration = format!("{waited:?}");
                logger.info("delay", &[("duration", &duration as &dyn fmt::Display)]);
            }
            inner.run().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex as SyncMutex;

    use super::*;
    use crate::job::FuncJob;

    /// Captures log events for assertions.
    #[derive(Default)]
    struct MemoryLogger {
        events: SyncMutex<Vec<String>>,
    }

    impl MemoryLogger {
        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl Logger for MemoryLogger {
        fn info(&self, msg: &str, _fields: &[crate::logger::Kv<'_>]) {
            self.events.lock().push(msg.to_string());
        }

        fn error(&self, _error: &dyn fmt::Display, msg: &str, _fields: &[crate::logger::Kv<'_>]) {
            self.events.lock().push(msg.to_string());
        }
    }

    fn appender(log: Arc<SyncMutex<Vec<&'static str>>>, label: &'static str) -> JobWrapper {
        Arc::new(move |job: Arc<dyn Job>| -> Arc<dyn Job> {
            let log = log.clone();
            Arc::new(FuncJob::new(move || {
                let log = log.clone();
                let job = job.clone();
                async move {
                    log.lock().push(label);
                    job.run().await;
                }
            }))
        })
    }

    #[tokio::test]
    async fn chain_applies_wrappers_in_declaration_order() {
        let log: Arc<SyncMutex<Vec<&'static str>>> = Arc::new(SyncMutex::new(Vec::new()));

        let chain = Chain::new(vec![
            appender(log.clone(), "a"),
            appender(log.clone(), "b"),
            appender(log.clone(), "c"),
        ]);

        let inner_log = log.clone();
        let job: Arc<dyn Job> = Arc::new(FuncJob::new(move || {
            let log = inner_log.clone();
            async move {
                log.lock().push("job");
            }
        }));

        chain.then(job).run().await;
        assert_eq!(*log.lock(), vec!["a", "b", "c", "job"]);
    }

    #[tokio::test]
    async fn empty_chain_returns_the_job_unchanged() {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let job: Arc<dyn Job> = Arc::new(FuncJob::new(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));

        Chain::default().then(job).run().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn recover_catches_panics() {
        let logger = Arc::new(MemoryLogger::default());
        let job: Arc<dyn Job> = Arc::new(FuncJob::new(|| async {
            panic!("job exploded");
        }));

        let wrapped = recover(logger.clone())(job);
        // Must not propagate.
        wrapped.run().await;

        assert_eq!(logger.events(), vec!["panic"]);
    }

    #[tokio::test]
    async fn recover_passes_through_normal_completion() {
        let logger = Arc::new(MemoryLogger::default());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let job: Arc<dyn Job> = Arc::new(FuncJob::new(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
            }
        }));

        recover(logger.clone())(job).run().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(logger.events().is_empty());
    }

    #[tokio::test]
    async fn skip_drops_overlapping_activations() {
        let logger = Arc::new(MemoryLogger::default());
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let job: Arc<dyn Job> = Arc::new(FuncJob::new(move || {
            let c = c.clone();
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }));

        let wrapped = skip_if_still_running(logger.clone())(job);

        let first = tokio::spawn(wrapped.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        wrapped.run().await; // overlaps; must be skipped
        first.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(logger.events(), vec!["skip"]);

        // After the first run completes the slot is free again.
        wrapped.run().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn skip_state_is_per_wrapped_job() {
        let logger: Arc<dyn Logger> = Arc::new(MemoryLogger::default());
        let wrapper = skip_if_still_running(logger);

        let make_job = |count: Arc<AtomicUsize>| -> Arc<dyn Job> {
            Arc::new(FuncJob::new(move || {
                let count = count.clone();
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }))
        };

        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));
        let a = wrapper(make_job(count_a.clone()));
        let b = wrapper(make_job(count_b.clone()));

        // One in-flight run of `a` must not gate `b`.
        let running_a = tokio::spawn(a.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        b.run().await;
        running_a.await.unwrap();

        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delay_serializes_activations() {
        let logger = Arc::new(MemoryLogger::default());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let count = Arc::new(AtomicUsize::new(0));

        let (cc, pp, nn) = (concurrent.clone(), peak.clone(), count.clone());
        let job: Arc<dyn Job> = Arc::new(FuncJob::new(move || {
            let (cc, pp, nn) = (cc.clone(), pp.clone(), nn.clone());
            async move {
                let now = cc.fetch_add(1, Ordering::SeqCst) + 1;
                pp.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(100)).await;
                cc.fetch_sub(1, Ordering::SeqCst);
                nn.fetch_add(1, Ordering::SeqCst);
            }
        }));

        let wrapped = delay_if_still_running(logger)(job);
        let r1 = tokio::spawn(wrapped.run());
        let r2 = tokio::spawn(wrapped.run());
        let r3 = tokio::spawn(wrapped.run());
        r1.await.unwrap();
        r2.await.unwrap();
        r3.await.unwrap();

        // Every activation ran, but never two at once.
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
