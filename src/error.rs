//! Error taxonomy for the scheduling core.
//!
//! Each error kind maps to one failure policy:
//! - [`ValidationError`]: bad location input, rejected when a [`Location`](crate::geo::Location) is built.
//! - [`SolarError`]: the sun does not rise or set on a date; callers pick a fallback mode.
//! - [`BackendError`]: a Timer Backend operation failed for one key.
//! - [`SinkError`]: applying an appearance failed; logged, never allowed to touch the schedule.
//! - [`ApplyError`]: aggregate result of diffing the desired schedule against the backend.

use chrono::NaiveDate;
use thiserror::Error;

/// Invalid location input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("latitude must be between -90 and 90 degrees (got {0})")]
    LatitudeOutOfRange(f64),
    #[error("longitude must be between -180 and 180 degrees (got {0})")]
    LongitudeOutOfRange(f64),
    #[error("invalid coordinate '{0}' (use a number or a hemisphere form like '43.65N' / '79.38W')")]
    InvalidCoordinate(String),
    #[error("unknown IANA timezone '{0}'")]
    UnknownTimezone(String),
}

/// Sunrise/sunset calculation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolarError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The sun stays above the horizon for the whole date.
    #[error("sun never sets on {date} at latitude {latitude:.2} (polar day)")]
    PolarDay { date: NaiveDate, latitude: f64 },
    /// The sun stays below the horizon for the whole date.
    #[error("sun never rises on {date} at latitude {latitude:.2} (polar night)")]
    PolarNight { date: NaiveDate, latitude: f64 },
}

impl SolarError {
    /// True for the two polar conditions.
    pub fn is_polar(&self) -> bool {
        matches!(self, SolarError::PolarDay { .. } | SolarError::PolarNight { .. })
    }
}

/// Timer Backend failure.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("timer backend unavailable: {0}")]
    Unavailable(String),
    #[error("timer backend rejected '{key}': {reason}")]
    Rejected { key: String, reason: String },
    #[error("'{command}' failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("timer backend I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink (appearance application) failure.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("no apply command configured")]
    NotConfigured,
    #[error("apply command '{command}' failed ({status}): {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

/// One key that could not be armed or disarmed.
#[derive(Debug)]
pub struct KeyFailure {
    pub key: String,
    pub error: BackendError,
}

/// Aggregate failure of an `apply` pass.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The armed set could not be read, nothing was changed.
    #[error("could not list armed timers: {0}")]
    Listing(#[source] BackendError),
    /// Some keys failed; every other key reached its desired state.
    #[error("{} timer operation(s) failed: {}", .failed.len(), failed_keys(.failed))]
    Partial {
        failed: Vec<KeyFailure>,
        armed: Vec<String>,
        disarmed: Vec<String>,
    },
}

impl ApplyError {
    /// Keys whose operation failed, in the order they were attempted.
    pub fn failed_keys(&self) -> Vec<&str> {
        match self {
            ApplyError::Listing(_) => Vec::new(),
            ApplyError::Partial { failed, .. } => failed.iter().map(|f| f.key.as_str()).collect(),
        }
    }
}

fn failed_keys(failed: &[KeyFailure]) -> String {
    failed
        .iter()
        .map(|f| f.key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
