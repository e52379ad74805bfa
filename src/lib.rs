//! # tempo-cron
//!
//! In-process cron scheduler: crontab spec parsing, timezone-aware
//! next-activation computation, and a timer-driven dispatcher that runs
//! every job activation on its own task.
//!
//! ## Features
//!
//! - Standard five-field crontab specs and a six-field seconds dialect,
//!   plus `@hourly`-style descriptors and `@every <duration>`.
//! - `TZ=` / `CRON_TZ=` per-schedule timezones with DST-aware activation
//!   times; nonexistent local times are skipped, repeated ones observed.
//! - Optional `L` (last day of month), `<dow>#<n>` (nth weekday) and year
//!   field parser modes.
//! - Entries can be added and removed while the scheduler runs.
//! - Job wrappers for panic recovery and overlap control
//!   (skip-if-still-running, delay-if-still-running).
//! - Graceful shutdown: [`Cron::stop`] returns a handle that resolves once
//!   every in-flight job has finished.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tempo_cron::Cron;
//!
//! #[tokio::main]
//! async fn main() {
//!     let cron = Cron::builder().seconds().build();
//!     cron.add_fn("*/5 * * * * *", || async {
//!         println!("five more seconds gone");
//!     })
//!     .expect("valid spec");
//!
//!     cron.start();
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     cron.stop().wait().await;
//! }
//! ```
//!
//! ## Overlap control
//!
//! Activations of the same entry are NOT serialised by default. Install a
//! wrapper chain when that matters:
//!
//! ```rust,no_run
//! use tempo_cron::{chain, Chain, Cron};
//!
//! let logger = tempo_cron::default_logger();
//! let cron = Cron::builder()
//!     .chain(Chain::new(vec![
//!         chain::recover(logger.clone()),
//!         chain::skip_if_still_running(logger),
//!     ]))
//!     .build();
//! # drop(cron);
//! ```

pub mod chain;
pub mod clock;
pub mod entry;
pub mod error;
pub mod job;
pub mod logger;
pub mod parser;
pub mod schedule;
pub mod scheduler;
pub mod spec;
pub mod store;
pub mod timezone;

pub use chain::{Chain, JobWrapper};
pub use clock::{Clock, SystemClock};
pub use entry::{Entry, EntryId};
pub use error::{Error, Result};
pub use job::{FuncJob, Job};
pub use logger::{default_logger, Logger, NopLogger, TracingLogger};
pub use parser::{ParseOption, Parser};
pub use schedule::{ConstantDelay, EndOfMonth, Fixed, OnStartup, Schedule};
pub use scheduler::{Cron, CronBuilder, StopHandle};
pub use spec::SpecSchedule;
pub use store::EntryStore;
pub use timezone::Location;
