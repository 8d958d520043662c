//! Command-line command handlers for sunshift.
//!
//! Each command lives in its own submodule. Every command is a short-lived
//! process: it loads the configuration, pins the clock when `--at` is given,
//! builds a [`TransitionScheduler`] over the systemd backend and the command
//! sink, runs one operation and exits.

pub mod disable;
pub mod enable;
pub mod fire;
pub mod help;
pub mod plan;
pub mod reconcile;
pub mod status;
pub mod sun;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;

use crate::args::GlobalOptions;
use crate::backend::{CommandSink, SystemdTimerBackend};
use crate::config::{self, Config};
use crate::error::ApplyError;
use crate::geo::Location;
use crate::schedule::{ApplyReport, ReconcileOutcome, ScheduleSettings, ScheduleState, TransitionScheduler};
use crate::time::source::{FixedTimeSource, init_time_source};

/// The scheduler every command drives.
pub(crate) type SystemScheduler = TransitionScheduler<SystemdTimerBackend, CommandSink>;

/// Loaded configuration and what every command derives from it.
pub(crate) struct CommandContext {
    pub config: Config,
    pub config_path: PathBuf,
    pub location: Location,
    pub settings: ScheduleSettings,
    pub now: DateTime<Utc>,
}

/// Load (or create) the configuration and resolve the clock.
pub(crate) fn load_context(options: &GlobalOptions) -> Result<CommandContext> {
    let config_path = config::get_config_path()?;
    let config = config::load()?;
    if options.debug_enabled {
        config.log_config();
    }

    let location = config.location()?;
    let settings = config.schedule_settings(crate::io::machine::jitter_salt())?;
    let now = resolve_now(options.at.as_deref(), location.timezone())?;

    Ok(CommandContext {
        config,
        config_path,
        location,
        settings,
        now,
    })
}

/// The current instant, pinned first when `--at` was given.
///
/// `at` is local wall-clock time in `tz`.
pub(crate) fn resolve_now(at: Option<&str>, tz: Tz) -> Result<DateTime<Utc>> {
    if let Some(at) = at {
        let local = crate::time::parse_datetime_in_tz(at, tz).map_err(anyhow::Error::msg)?;
        init_time_source(Arc::new(FixedTimeSource::new(local.with_timezone(&Utc))));
        log_debug!("Clock pinned to {}", local.format("%Y-%m-%d %H:%M:%S %Z"));
    }
    Ok(crate::time::source::now())
}

/// Build the scheduler over the user's systemd timers and the configured command.
///
/// The initial state mirrors the `enabled` setting, since each process starts
/// without memory of the previous one.
pub(crate) fn build_scheduler(context: &CommandContext) -> Result<SystemScheduler> {
    let backend = SystemdTimerBackend::user_default().context("Cannot use systemd user timers")?;
    let sink = CommandSink::new(
        context.config.apply_command().to_vec(),
        CommandSink::default_state_file(),
    );
    let state = if context.config.is_enabled() {
        ScheduleState::Planned
    } else {
        ScheduleState::Disabled
    };
    Ok(
        TransitionScheduler::new(context.location, context.settings.clone(), backend, sink)
            .with_state(state),
    )
}

/// Log an apply summary, turning a failed apply into an error.
pub(crate) fn finish_apply(result: Result<ApplyReport, ApplyError>) -> Result<ApplyReport> {
    match result {
        Ok(report) => {
            log_decorated!(
                "Timers: {} armed, {} disarmed, {} unchanged",
                report.armed.len(),
                report.disarmed.len(),
                report.unchanged.len()
            );
            Ok(report)
        }
        Err(ApplyError::Partial {
            failed,
            armed,
            disarmed,
        }) => {
            log_decorated!(
                "Timers: {} armed, {} disarmed, {} failed",
                armed.len(),
                disarmed.len(),
                failed.len()
            );
            for failure in &failed {
                log_indented!("{}: {}", failure.key, failure.error);
            }
            Err(ApplyError::Partial {
                failed,
                armed,
                disarmed,
            }
            .into())
        }
        Err(error) => {
            log_error!("No timers were changed; armed transitions run out after the last one fires");
            Err(error.into())
        }
    }
}

/// One-line description of a reconcile pass.
pub(crate) fn describe_reconcile(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::Applied(mode) => format!("switched to {mode}"),
        ReconcileOutcome::NoOp(mode) => format!("already {mode}"),
        ReconcileOutcome::KeptLastKnown { mode, .. } => format!("kept {mode} (no sunrise/sunset today)"),
        ReconcileOutcome::FallbackApplied { mode, .. } => {
            format!("applied {mode} (no sunrise/sunset today)")
        }
        ReconcileOutcome::SinkFailed { mode, error } => format!("could not apply {mode}: {error}"),
    }
}
