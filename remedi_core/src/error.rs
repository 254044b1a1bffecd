//! Error types for the remedi_core library.

use chrono::NaiveDate;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for remedi_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Schedule validation error
    #[error("Schedule validation error: {0}")]
    Schedule(#[from] ScheduleError),

    /// Trial lifecycle error
    #[error("Trial error: {0}")]
    Trial(String),

    /// State management error
    #[error("State error: {0}")]
    State(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Validation failures for a `ScheduleSpec`
///
/// Each variant carries the current value and the limit so callers can
/// render a user-facing message. Checks run in declaration order and the
/// first failure short-circuits.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("frequency of {count} doses per day exceeds the maximum of {max}")]
    FrequencyExceeded { count: u8, max: u8 },

    #[error("{configured} dose times configured but frequency is {expected}")]
    TimeCountMismatch { configured: usize, expected: u8 },

    #[error("start date {start} is in the past")]
    PastStartDate { start: NaiveDate },

    #[error("consecutive doses only {interval_minutes} minutes apart, minimum is {minimum_hours} hours")]
    IntervalTooShort {
        interval_minutes: i64,
        minimum_hours: u32,
    },
}
