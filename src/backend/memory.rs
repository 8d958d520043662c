//! In-memory Timer Backend and Sink.
//!
//! [`MemoryTimerBackend`] holds the armed set in a map and counts every write,
//! which makes it the backend of choice for tests and dry runs. Failures can be
//! injected per key to exercise partial-apply reporting. [`RecordingSink`]
//! remembers every mode it was asked to apply.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};

use super::{ArmedEntry, Sink, TimerBackend};
use crate::error::{BackendError, SinkError};
use crate::schedule::{Mode, TransitionKind};

#[derive(Debug, Default, Clone)]
pub struct MemoryTimerBackend {
    armed: BTreeMap<String, (DateTime<Utc>, TransitionKind)>,
    fail_arm: BTreeSet<String>,
    fail_disarm: BTreeSet<String>,
    unavailable: bool,
    arm_calls: usize,
    disarm_calls: usize,
}

impl MemoryTimerBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing armed set, e.g. a copy of a real backend's state.
    pub fn with_entries(entries: impl IntoIterator<Item = ArmedEntry>) -> Self {
        let mut backend = Self::new();
        for entry in entries {
            let kind = if entry.key.starts_with("replan-") {
                TransitionKind::DailyReplan
            } else {
                TransitionKind::EventTransition
            };
            backend.armed.insert(entry.key, (entry.fire_at, kind));
        }
        backend
    }

    /// Make every future `arm` of `key` fail.
    pub fn fail_arm_for(&mut self, key: impl Into<String>) {
        self.fail_arm.insert(key.into());
    }

    /// Make every future `disarm` of `key` fail.
    pub fn fail_disarm_for(&mut self, key: impl Into<String>) {
        self.fail_disarm.insert(key.into());
    }

    /// Make every operation fail as if the backend were down.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Successful and failed `arm` + `disarm` calls since creation.
    pub fn writes(&self) -> usize {
        self.arm_calls + self.disarm_calls
    }

    pub fn arm_calls(&self) -> usize {
        self.arm_calls
    }

    pub fn disarm_calls(&self) -> usize {
        self.disarm_calls
    }

    pub fn is_armed(&self, key: &str) -> bool {
        self.armed.contains_key(key)
    }

    pub fn fire_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.armed.get(key).map(|(at, _)| *at)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }

    /// Entries due at `now`, earliest first. Simulates the backend's delivery.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ArmedEntry> {
        let mut due: Vec<ArmedEntry> = self
            .armed
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(key, (at, _))| ArmedEntry {
                key: key.clone(),
                fire_at: *at,
            })
            .collect();
        due.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then_with(|| a.key.cmp(&b.key)));
        due
    }

    fn check_available(&self) -> Result<(), BackendError> {
        if self.unavailable {
            return Err(BackendError::Unavailable("memory backend switched off".to_string()));
        }
        Ok(())
    }
}

impl TimerBackend for MemoryTimerBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn list_armed(&self) -> Result<Vec<ArmedEntry>, BackendError> {
        self.check_available()?;
        Ok(self
            .armed
            .iter()
            .map(|(key, (at, _))| ArmedEntry {
                key: key.clone(),
                fire_at: *at,
            })
            .collect())
    }

    fn arm(&mut self, key: &str, fire_at: DateTime<Utc>, kind: TransitionKind) -> Result<(), BackendError> {
        self.arm_calls += 1;
        self.check_available()?;
        if self.fail_arm.contains(key) {
            return Err(BackendError::Rejected {
                key: key.to_string(),
                reason: "injected arm failure".to_string(),
            });
        }
        self.armed.insert(key.to_string(), (fire_at, kind));
        Ok(())
    }

    fn disarm(&mut self, key: &str) -> Result<(), BackendError> {
        self.disarm_calls += 1;
        self.check_available()?;
        if self.fail_disarm.contains(key) {
            return Err(BackendError::Rejected {
                key: key.to_string(),
                reason: "injected disarm failure".to_string(),
            });
        }
        self.armed.remove(key);
        Ok(())
    }
}

/// Sink that applies nothing and records every accepted mode.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    applied: Vec<Mode>,
    active: Option<Mode>,
    failing: bool,
    attempts: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that reports `mode` as already showing.
    pub fn showing(mode: Option<Mode>) -> Self {
        Self {
            active: mode,
            ..Self::default()
        }
    }

    /// Make every future `apply_mode` fail.
    pub fn set_failing(&mut self, failing: bool) {
        self.failing = failing;
    }

    /// Modes accepted so far, oldest first.
    pub fn applied(&self) -> &[Mode] {
        &self.applied
    }

    /// Calls to `apply_mode`, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}

impl Sink for RecordingSink {
    fn apply_mode(&mut self, mode: Mode) -> Result<(), SinkError> {
        self.attempts += 1;
        if self.failing {
            return Err(SinkError::Other("injected sink failure".to_string()));
        }
        self.applied.push(mode);
        self.active = Some(mode);
        Ok(())
    }

    fn active_mode(&self) -> Option<Mode> {
        self.active
    }
}
