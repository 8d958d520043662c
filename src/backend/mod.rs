//! Collaborator interfaces of the scheduling core.
//!
//! The scheduler never reaches for process-wide scheduling state. It talks to
//! two injected collaborators:
//!
//! - [`TimerBackend`]: durable one-shot wake-ups keyed by stable strings
//! - [`Sink`]: applies the day or night appearance
//!
//! ## Implementations
//!
//! - [`memory::MemoryTimerBackend`]: in-memory armed set with failure injection
//! - [`memory::RecordingSink`]: in-memory sink for dry runs and tests
//! - [`systemd::SystemdTimerBackend`]: one systemd user timer unit per key
//! - [`command::CommandSink`]: runs a configured command with the mode appended

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{BackendError, KeyFailure, SinkError};
use crate::schedule::{Mode, TransitionKind};

pub mod command;
pub mod memory;
pub mod systemd;

pub use command::CommandSink;
pub use memory::{MemoryTimerBackend, RecordingSink};
pub use systemd::SystemdTimerBackend;

/// One wake-up the backend currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArmedEntry {
    pub key: String,
    pub fire_at: DateTime<Utc>,
}

/// Durable wake-up scheduling.
///
/// Implementations are expected to be fast local operations that fail fast when
/// the underlying scheduler is unavailable. Delivery is at-least-once: when an
/// entry's instant arrives the backend hands it back to the scheduler's
/// `on_fire`, possibly more than once.
pub trait TimerBackend {
    /// Human-readable name for logs.
    fn backend_name(&self) -> &'static str;

    /// Every entry currently armed, in no particular order.
    fn list_armed(&self) -> Result<Vec<ArmedEntry>, BackendError>;

    /// Arm `key` at `fire_at`, replacing any entry already armed under that key.
    fn arm(&mut self, key: &str, fire_at: DateTime<Utc>, kind: TransitionKind) -> Result<(), BackendError>;

    /// Remove `key`. Removing a key that is not armed succeeds.
    fn disarm(&mut self, key: &str) -> Result<(), BackendError>;

    /// Finish a batch of `arm`/`disarm` calls.
    ///
    /// Backends that activate wake-ups lazily do it here. Every key returned
    /// failed to activate and is no longer listed as armed.
    fn commit(&mut self) -> Vec<KeyFailure> {
        Vec::new()
    }
}

/// Applies an appearance mode.
///
/// Must be idempotent: applying the mode that is already active is harmless.
pub trait Sink {
    fn apply_mode(&mut self, mode: Mode) -> Result<(), SinkError>;

    /// Mode this sink last applied successfully, if it can tell.
    fn active_mode(&self) -> Option<Mode> {
        None
    }
}

impl<T: TimerBackend + ?Sized> TimerBackend for Box<T> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    fn list_armed(&self) -> Result<Vec<ArmedEntry>, BackendError> {
        (**self).list_armed()
    }

    fn arm(&mut self, key: &str, fire_at: DateTime<Utc>, kind: TransitionKind) -> Result<(), BackendError> {
        (**self).arm(key, fire_at, kind)
    }

    fn disarm(&mut self, key: &str) -> Result<(), BackendError> {
        (**self).disarm(key)
    }

    fn commit(&mut self) -> Vec<KeyFailure> {
        (**self).commit()
    }
}
