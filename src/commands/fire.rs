//! Implementation of the fire command.
//!
//! `sunshift-fire@<key>.service` runs `sunshift fire <key>` when the matching
//! timer elapses. The armed instant is read back from the backend so a fire
//! delivered long after it was due (suspend, powered off) can be recognised
//! and reconciled instead of applied blindly.

use anyhow::Result;

use crate::args::GlobalOptions;
use crate::backend::{ArmedEntry, TimerBackend};
use crate::io::lock::acquire_lock;
use crate::schedule::{FireOutcome, ScheduledTransition};

/// Handle a delivered timer.
///
/// Sink failures are logged and reported as success: the timer itself did its
/// job, and the next fire or reconcile retries the mode. Only a failed replan
/// makes the command fail.
pub fn handle_fire_command(key: &str, options: &GlobalOptions) -> Result<()> {
    log_version!();
    let _lock = acquire_lock()?;

    let context = super::load_context(options)?;
    let mut scheduler = super::build_scheduler(&context)?;
    let tz = scheduler.location().timezone();

    let fire_at = match scheduler.backend().list_armed() {
        Ok(entries) => entries
            .into_iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.fire_at),
        Err(e) => {
            log_warning!("Cannot read back armed timers: {e}");
            None
        }
    };
    let fire_at = fire_at.unwrap_or_else(|| {
        log_debug!("{key} is not armed, treating it as due now");
        context.now
    });

    let entry = ArmedEntry {
        key: key.to_string(),
        fire_at,
    };
    let transition = ScheduledTransition::from_armed(&entry, tz).map_err(anyhow::Error::msg)?;

    log_block_start!("Timer {key} fired");
    let result = match scheduler.on_fire(&transition, context.now) {
        FireOutcome::Applied(_) => Ok(()),
        FireOutcome::SinkFailed { mode, error } => {
            log_indented!("{mode} mode not applied ({error}), the next reconcile will retry");
            Ok(())
        }
        FireOutcome::Reconciled(outcome) => {
            log_decorated!("Mode: {}", super::describe_reconcile(&outcome));
            Ok(())
        }
        FireOutcome::Replanned(report) => {
            log_decorated!("Mode: {}", super::describe_reconcile(&report.reconcile));
            super::finish_apply(report.apply).map(|_| ())
        }
        FireOutcome::Ignored => {
            log_decorated!("Scheduling is disabled, ignoring");
            Ok(())
        }
    };
    log_end!();
    result
}

/// Display help for the fire command
pub fn display_help() {
    log_version!();
    log_block_start!("fire - Handle a delivered timer");
    log_block_start!("Usage: sunshift fire <key>");
    log_block_start!("Arguments:");
    log_indented!("key  sunrise-YYYY-MM-DD, sunset-YYYY-MM-DD or replan-YYYY-MM-DD");
    log_block_start!("Description:");
    log_indented!("Run by sunshift-fire@.service when a timer elapses. Sunrise and");
    log_indented!("sunset keys apply day or night; a fire delivered later than");
    log_indented!("late_fire_grace reconciles instead. A replan key reconciles the");
    log_indented!("mode and re-arms the lookahead window.");
    log_pipe!();
    log_indented!("Does nothing while scheduling is disabled.");
    log_end!();
}
