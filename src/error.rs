//! Error types for spec parsing.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported while parsing a crontab spec.
///
/// All variants are parse-time failures: a spec that parses successfully can
/// still be unsatisfiable (e.g. `0 0 0 30 Feb ?`), which is not an error —
/// its schedule simply never yields a next activation.
#[derive(Debug, Error)]
pub enum Error {
    #[error("expected {expected} field(s), found {found}: {spec:?}")]
    FieldCount {
        expected: String,
        found: usize,
        spec: String,
    },

    #[error("failed to parse int from {0:?}")]
    InvalidNumber(String),

    #[error("negative number ({0}) not allowed")]
    NegativeNumber(i64),

    #[error("beginning of range ({value}) below minimum ({min}): {expr:?}")]
    BelowMinimum { value: u32, min: u32, expr: String },

    #[error("end of range ({value}) above maximum ({max}): {expr:?}")]
    AboveMaximum { value: u32, max: u32, expr: String },

    #[error("beginning of range ({start}) beyond end of range ({end}): {expr:?}")]
    InvertedRange { start: u32, end: u32, expr: String },

    #[error("step of range should be a positive number: {0:?}")]
    ZeroStep(String),

    #[error("too many hyphens: {0:?}")]
    TooManyHyphens(String),

    #[error("too many slashes: {0:?}")]
    TooManySlashes(String),

    #[error("unrecognized descriptor: {0:?}")]
    UnrecognizedDescriptor(String),

    #[error("this parser does not accept descriptors: {0:?}")]
    DescriptorNotEnabled(String),

    #[error("failed to parse duration from {0:?}")]
    InvalidDuration(String),

    #[error("provided bad location {0:?}")]
    InvalidTimezone(String),

    #[error("malformed nth-weekday expression: {0:?}")]
    InvalidNth(String),
}
