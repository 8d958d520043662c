//! Implementation of the plan command.
//!
//! A dry run: the real armed set is copied into a [`MemoryTimerBackend`] and
//! the plan is applied there, so the output shows exactly what `enable` or the
//! next replan would arm and disarm without touching any timer.

use anyhow::Result;

use crate::args::GlobalOptions;
use crate::backend::{MemoryTimerBackend, RecordingSink, Sink, TimerBackend};
use crate::schedule::{TransitionKind, TransitionScheduler};

/// Handle the plan command.
pub fn handle_plan_command(options: &GlobalOptions) -> Result<()> {
    log_version!();

    let context = super::load_context(options)?;
    let live = super::build_scheduler(&context)?;
    let tz = context.location.timezone();

    let armed = live.backend().list_armed()?;
    let mut dry_run = TransitionScheduler::new(
        context.location,
        context.settings.clone(),
        MemoryTimerBackend::with_entries(armed),
        RecordingSink::showing(live.sink().active_mode()),
    );

    log_block_start!(
        "Plan for {} from {}",
        context.location,
        context.now.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z")
    );
    let plan = dry_run.plan(context.now);
    for transition in &plan.transitions {
        let what = match transition.kind {
            TransitionKind::EventTransition => format!("-> {}", transition.mode),
            TransitionKind::DailyReplan => "replan".to_string(),
        };
        log_indented!(
            "{}  {:<22} {}",
            transition.fire_at.format("%a %Y-%m-%d %H:%M:%S %Z"),
            transition.key_string(),
            what
        );
    }
    for skipped in &plan.skipped {
        log_indented!("{}  skipped: {}", skipped.date, skipped.reason);
    }

    if !context.config.is_enabled() {
        log_block_start!("Scheduling is disabled; 'sunshift enable' would arm the above");
        log_end!();
        return Ok(());
    }

    log_block_start!("Changes against the armed timers:");
    match dry_run.apply(&plan.transitions) {
        Ok(report) if report.writes() == 0 => log_indented!("none, everything is already armed"),
        Ok(report) => {
            for key in &report.armed {
                log_indented!("+ {key}");
            }
            for key in &report.disarmed {
                log_indented!("- {key}");
            }
            log_indented!("{} unchanged", report.unchanged.len());
        }
        Err(error) => log_warning!("Dry run failed: {error}"),
    }
    log_end!();
    Ok(())
}

/// Display help for the plan command
pub fn display_help() {
    log_version!();
    log_block_start!("plan - Show upcoming transitions without arming them");
    log_block_start!("Usage: sunshift plan");
    log_block_start!("Description:");
    log_indented!("Lists every sunrise and sunset in the lookahead window and the");
    log_indented!("next daily replan, then shows which timers a replan would add");
    log_indented!("(+) or remove (-). Nothing is armed, disarmed or applied.");
    log_block_start!("Examples:");
    log_indented!("# Preview the schedule around the autumn clock change");
    log_indented!("sunshift --at \"2024-11-02 12:00:00\" plan");
    log_end!();
}
