//! The stateful side of scheduling: diffing plans into a Timer Backend,
//! reconciling the active mode, and handling fired timers.
//!
//! The scheduler owns its backend and sink, so `&mut self` is what keeps two
//! operations from interleaving inside one process. Across processes the CLI
//! holds the advisory lock from [`crate::io::lock`] around every mutating call.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use super::planner::{self, Plan, ScheduleSettings, fallback_mode, mode_at};
use super::{Mode, ScheduleState, ScheduledTransition, TransitionKind};
use crate::backend::{Sink, TimerBackend};
use crate::error::{ApplyError, KeyFailure, SinkError, SolarError};
use crate::geo::Location;
use crate::time;

/// What a successful `apply` changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Keys newly armed or re-armed at a different instant.
    pub armed: Vec<String>,
    /// Keys removed because they are no longer desired.
    pub disarmed: Vec<String>,
    /// Keys already armed at the desired instant and left alone.
    pub unchanged: Vec<String>,
}

impl ApplyReport {
    /// Number of backend writes the apply performed.
    pub fn writes(&self) -> usize {
        self.armed.len() + self.disarmed.len()
    }
}

/// Result of a reconcile pass.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The sink was told to switch to this mode.
    Applied(Mode),
    /// The mode already matched.
    NoOp(Mode),
    /// Today's sun times are undefined; the last applied mode stays.
    KeptLastKnown { mode: Mode, reason: SolarError },
    /// Today's sun times are undefined and nothing was applied yet, so the
    /// polar fallback was applied.
    FallbackApplied { mode: Mode, reason: SolarError },
    /// The sink refused the mode. The schedule is unaffected.
    SinkFailed { mode: Mode, error: SinkError },
}

impl ReconcileOutcome {
    /// The mode this pass settled on, whether or not the sink accepted it.
    pub fn mode(&self) -> Mode {
        match self {
            ReconcileOutcome::Applied(mode)
            | ReconcileOutcome::NoOp(mode)
            | ReconcileOutcome::KeptLastKnown { mode, .. }
            | ReconcileOutcome::FallbackApplied { mode, .. }
            | ReconcileOutcome::SinkFailed { mode, .. } => *mode,
        }
    }

    pub fn is_sink_failure(&self) -> bool {
        matches!(self, ReconcileOutcome::SinkFailed { .. })
    }
}

/// Reconcile plus re-plan, as done by `enable` and by a fired replan.
#[derive(Debug)]
pub struct CycleReport {
    pub reconcile: ReconcileOutcome,
    pub apply: Result<ApplyReport, ApplyError>,
}

/// Result of handling one fired timer.
#[derive(Debug)]
pub enum FireOutcome {
    /// Sunrise/sunset fire applied its mode.
    Applied(Mode),
    /// Sunrise/sunset fire whose mode the sink refused.
    SinkFailed { mode: Mode, error: SinkError },
    /// Sunrise/sunset fire delivered too late to trust; reconciled instead.
    Reconciled(ReconcileOutcome),
    /// Daily replan: reconciled, then re-armed the window.
    Replanned(CycleReport),
    /// Scheduling is disabled; the fire was dropped.
    Ignored,
}

/// Keeps the Timer Backend armed with the upcoming transitions and the sink
/// showing the right mode.
pub struct TransitionScheduler<B: TimerBackend, S: Sink> {
    location: Location,
    settings: ScheduleSettings,
    backend: B,
    sink: S,
    last_applied: Option<Mode>,
    state: ScheduleState,
}

impl<B: TimerBackend, S: Sink> TransitionScheduler<B, S> {
    /// Create a scheduler in the `Disabled` state.
    ///
    /// The last known mode is seeded from the sink, so a fresh process does
    /// not re-apply a mode that is already showing.
    pub fn new(location: Location, settings: ScheduleSettings, backend: B, sink: S) -> Self {
        let last_applied = sink.active_mode();
        Self {
            location,
            settings,
            backend,
            sink,
            last_applied,
            state: ScheduleState::Disabled,
        }
    }

    /// Builder-style override of the initial state, for processes started by a
    /// timer fire while scheduling is already enabled.
    pub fn with_state(mut self, state: ScheduleState) -> Self {
        self.state = state;
        self
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn state(&self) -> ScheduleState {
        self.state
    }

    pub fn last_applied(&self) -> Option<Mode> {
        self.last_applied
    }

    /// Plan the lookahead window. Pure apart from logging skipped dates.
    pub fn plan(&self, now: DateTime<Utc>) -> Plan {
        let plan = planner::plan(&self.location, now, &self.settings);
        for skipped in &plan.skipped {
            log_warning!("Skipping {}: {}", skipped.date, skipped.reason);
        }
        plan
    }

    /// Diff `transitions` against the backend's armed set.
    ///
    /// Stale keys are disarmed, missing or moved keys are armed, keys already
    /// armed at the right instant are not touched. Every key is attempted even
    /// after a failure, then the backend commits the batch; failures from
    /// either step are logged and returned together.
    pub fn apply(&mut self, transitions: &[ScheduledTransition]) -> Result<ApplyReport, ApplyError> {
        let current: BTreeMap<String, DateTime<Utc>> = self
            .backend
            .list_armed()
            .map_err(|e| {
                log_error!("Cannot list {} timers: {e}", self.backend.backend_name());
                ApplyError::Listing(e)
            })?
            .into_iter()
            .map(|entry| (entry.key, time::truncate_to_second(entry.fire_at)))
            .collect();

        let mut seen = HashSet::new();
        let desired: Vec<(String, DateTime<Utc>, TransitionKind)> = transitions
            .iter()
            .map(|t| (t.key_string(), time::truncate_to_second(t.fire_at_utc()), t.kind))
            .filter(|(key, _, _)| seen.insert(key.clone()))
            .collect();

        let mut report = ApplyReport::default();
        let mut failed = Vec::new();

        for key in current.keys().filter(|key| !seen.contains(*key)) {
            match self.backend.disarm(key) {
                Ok(()) => {
                    log_debug!("Disarmed {key}");
                    report.disarmed.push(key.clone());
                }
                Err(error) => {
                    log_warning!("Failed to disarm {key}: {error}");
                    failed.push(KeyFailure {
                        key: key.clone(),
                        error,
                    });
                }
            }
        }

        for (key, fire_at, kind) in desired {
            if current.get(&key) == Some(&fire_at) {
                report.unchanged.push(key);
                continue;
            }
            match self.backend.arm(&key, fire_at, kind) {
                Ok(()) => {
                    log_debug!(
                        "Armed {key} at {}",
                        time::localize(fire_at, self.location.timezone()).format("%Y-%m-%d %H:%M:%S %Z")
                    );
                    report.armed.push(key);
                }
                Err(error) => {
                    log_warning!("Failed to arm {key}: {error}");
                    failed.push(KeyFailure { key, error });
                }
            }
        }

        for failure in self.backend.commit() {
            log_warning!("Failed to activate {}: {}", failure.key, failure.error);
            report.armed.retain(|key| *key != failure.key);
            report.unchanged.retain(|key| *key != failure.key);
            failed.push(failure);
        }

        if failed.is_empty() {
            return Ok(report);
        }

        let error = ApplyError::Partial {
            failed,
            armed: report.armed.into_iter().chain(report.unchanged).collect(),
            disarmed: report.disarmed,
        };
        log_error!("{error}");
        Err(error)
    }

    /// Plan from `now` and apply the result.
    pub fn replan(&mut self, now: DateTime<Utc>) -> Result<ApplyReport, ApplyError> {
        let plan = self.plan(now);
        self.apply(&plan.transitions)
    }

    /// Make the sink show the mode that should be active at `now`.
    ///
    /// The sink is only invoked when that mode differs from the last one
    /// applied. When today's sun times cannot be computed, the last applied
    /// mode is kept; with nothing applied yet, the polar fallback is used.
    pub fn reconcile_now(&mut self, now: DateTime<Utc>) -> ReconcileOutcome {
        match mode_at(&self.location, now) {
            Ok(mode) if self.last_applied == Some(mode) => {
                log_debug!("Mode already {mode}, nothing to do");
                ReconcileOutcome::NoOp(mode)
            }
            Ok(mode) => match self.apply_to_sink(mode) {
                Ok(()) => {
                    log_decorated!("Switched to {mode} mode");
                    ReconcileOutcome::Applied(mode)
                }
                Err(error) => ReconcileOutcome::SinkFailed { mode, error },
            },
            Err(reason) => {
                log_warning!("Cannot determine today's mode: {reason}");
                match self.last_applied {
                    Some(mode) => {
                        log_indented!("Keeping last known mode: {mode}");
                        ReconcileOutcome::KeptLastKnown { mode, reason }
                    }
                    None => {
                        let mode = fallback_mode(&reason);
                        log_indented!("No mode applied yet, falling back to {mode}");
                        match self.apply_to_sink(mode) {
                            Ok(()) => ReconcileOutcome::FallbackApplied { mode, reason },
                            Err(error) => ReconcileOutcome::SinkFailed { mode, error },
                        }
                    }
                }
            }
        }
    }

    /// Handle a timer the backend delivered at `now`.
    ///
    /// Safe to call more than once for the same transition. Sink failures are
    /// contained in the outcome and never abort the replan bookkeeping.
    pub fn on_fire(&mut self, transition: &ScheduledTransition, now: DateTime<Utc>) -> FireOutcome {
        let key = transition.key_string();
        if self.state == ScheduleState::Disabled {
            log_debug!("Ignoring {key}, scheduling is disabled");
            return FireOutcome::Ignored;
        }

        match transition.kind {
            TransitionKind::EventTransition => {
                let lateness = now - transition.fire_at_utc();
                if lateness > self.settings.late_fire_grace {
                    log_info!(
                        "{key} delivered {} late, reconciling instead",
                        time::format_duration(lateness)
                    );
                    return FireOutcome::Reconciled(self.reconcile_now(now));
                }

                let mode = transition.mode;
                match self.apply_to_sink(mode) {
                    Ok(()) => {
                        log_decorated!("{key}: switched to {mode} mode");
                        FireOutcome::Applied(mode)
                    }
                    Err(error) => FireOutcome::SinkFailed { mode, error },
                }
            }
            TransitionKind::DailyReplan => {
                log_block_start!("Daily replan ({key})");
                FireOutcome::Replanned(self.cycle(now))
            }
        }
    }

    /// Arm the lookahead window and reconcile, entering `Planned`.
    ///
    /// Stays `Disabled` only when the backend could not even be listed.
    pub fn enable(&mut self, now: DateTime<Utc>) -> CycleReport {
        let apply = self.replan(now);
        if !matches!(apply, Err(ApplyError::Listing(_))) {
            self.state = ScheduleState::Planned;
        }
        let reconcile = self.reconcile_now(now);
        CycleReport { reconcile, apply }
    }

    /// Disarm everything the backend lists and enter `Disabled`.
    ///
    /// Any replan still armed is removed with the rest, so a fire that slips
    /// through afterwards finds the scheduler disabled and does nothing.
    pub fn disable(&mut self) -> Result<Vec<String>, ApplyError> {
        self.state = ScheduleState::Disabled;
        let outcome = self.apply(&[]);
        outcome.map(|report| report.disarmed)
    }

    fn cycle(&mut self, now: DateTime<Utc>) -> CycleReport {
        let reconcile = self.reconcile_now(now);
        let apply = self.replan(now);
        CycleReport { reconcile, apply }
    }

    fn apply_to_sink(&mut self, mode: Mode) -> Result<(), SinkError> {
        match self.sink.apply_mode(mode) {
            Ok(()) => {
                self.last_applied = Some(mode);
                Ok(())
            }
            Err(error) => {
                log_error!("Failed to apply {mode} mode: {error}");
                Err(error)
            }
        }
    }
}
