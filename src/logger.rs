//! The logging capability consumed by the dispatcher and job wrappers.
//!
//! The scheduler never logs through a process-wide singleton; it is handed a
//! [`Logger`] at construction. [`default_logger`] is a factory for the
//! `tracing`-backed default.

use std::fmt;
use std::sync::Arc;

/// A structured key/value pair attached to a log event.
pub type Kv<'a> = (&'a str, &'a dyn fmt::Display);

/// Minimal structured-log interface.
///
/// The dispatcher emits `start`, `stop`, `schedule`, `wake`, `run` and
/// `removed` events; the standard wrappers emit `skip`, `delay` and `panic`.
pub trait Logger: Send + Sync + 'static {
    fn info(&self, msg: &str, fields: &[Kv<'_>]);
    fn error(&self, error: &dyn fmt::Display, msg: &str, fields: &[Kv<'_>]);
}

/// The default [`Logger`]: forwards to [`tracing`] under target `tempo_cron`.
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}

/// Forwards events to [`tracing`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn info(&self, msg: &str, fields: &[Kv<'_>]) {
        tracing::info!(target: "tempo_cron", "{msg}{}", render(fields));
    }

    fn error(&self, error: &dyn fmt::Display, msg: &str, fields: &[Kv<'_>]) {
        tracing::error!(target: "tempo_cron", error = %error, "{msg}{}", render(fields));
    }
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopLogger;

impl Logger for NopLogger {
    fn info(&self, _msg: &str, _fields: &[Kv<'_>]) {}
    fn error(&self, _error: &dyn fmt::Display, _msg: &str, _fields: &[Kv<'_>]) {}
}

fn render(fields: &[Kv<'_>]) -> String {
    use fmt::Write;

    let mut out = String::new();
    for (key, value) in fields {
        let _ = write!(out, " {key}={value}");
    }
    out
}
