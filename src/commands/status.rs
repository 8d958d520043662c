//! Implementation of the status command.
//!
//! Shows the current mode, today's sun times, the next transition and what
//! the Timer Backend has armed, either human-readable or as JSON.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::args::GlobalOptions;
use crate::backend::{ArmedEntry, Sink, TimerBackend};
use crate::geo::{Location, solar_event};
use crate::logger::Log;
use crate::schedule::{Mode, ScheduleSettings, ScheduleState, mode_at, plan};
use crate::time::format_duration;

/// Snapshot printed by `sunshift status`.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub state: ScheduleState,
    pub location: Location,
    pub now: String,
    /// Mode that should be showing now; `None` on dates without sunrise or sunset.
    pub mode: Option<Mode>,
    pub last_applied: Option<Mode>,
    pub sunrise: Option<String>,
    pub sunset: Option<String>,
    /// Why today has no sunrise/sunset, if it has none.
    pub solar_note: Option<String>,
    pub next_transition: Option<NextTransition>,
    pub backend: String,
    pub armed: Vec<ArmedEntry>,
}

#[derive(Debug, Serialize)]
pub struct NextTransition {
    pub key: String,
    pub fire_at: String,
    pub mode: Mode,
    pub in_seconds: i64,
}

/// Assemble the status snapshot. Pure, apart from what the caller read.
pub fn build_status(
    location: &Location,
    settings: &ScheduleSettings,
    now: DateTime<Utc>,
    state: ScheduleState,
    last_applied: Option<Mode>,
    backend: &str,
    armed: Vec<ArmedEntry>,
) -> StatusReport {
    let tz = location.timezone();
    let local_now = now.with_timezone(&tz);

    let (sunrise, sunset, solar_note) = match solar_event(location, local_now.date_naive()) {
        Ok(event) => (
            Some(event.sunrise_in(tz).to_rfc3339()),
            Some(event.sunset_in(tz).to_rfc3339()),
            None,
        ),
        Err(reason) => (None, None, Some(reason.to_string())),
    };

    let next_transition = plan(location, now, settings).next_event().map(|next| NextTransition {
        key: next.key_string(),
        fire_at: next.fire_at.to_rfc3339(),
        mode: next.mode,
        in_seconds: (next.fire_at_utc() - now).num_seconds(),
    });

    StatusReport {
        state,
        location: *location,
        now: local_now.to_rfc3339(),
        mode: mode_at(location, now).ok(),
        last_applied,
        sunrise,
        sunset,
        solar_note,
        next_transition,
        backend: backend.to_string(),
        armed,
    }
}

/// Handle the status command.
pub fn handle_status_command(options: &GlobalOptions, json: bool) -> Result<()> {
    if json {
        // Keep stdout machine-readable
        Log::set_enabled(false);
    }

    let context = super::load_context(options)?;
    let scheduler = super::build_scheduler(&context)?;
    let backend = scheduler.backend();
    let armed = backend.list_armed().unwrap_or_else(|e| {
        log_warning!("Cannot list armed timers: {e}");
        Vec::new()
    });

    let report = build_status(
        &context.location,
        &context.settings,
        context.now,
        scheduler.state(),
        scheduler.sink().active_mode(),
        backend.backend_name(),
        armed,
    );

    if json {
        let rendered =
            serde_json::to_string_pretty(&report).context("Failed to serialize status")?;
        println!("{rendered}");
    } else {
        display_report(&report);
    }
    Ok(())
}

fn display_report(report: &StatusReport) {
    let state = match report.state {
        ScheduleState::Planned => "enabled",
        ScheduleState::Disabled => "disabled",
    };
    println!("    Scheduling: {state}");
    println!("      Location: {}", report.location);
    println!("           Now: {}", report.now);
    match report.mode {
        Some(mode) => println!("  Current mode: {mode}"),
        None => println!("  Current mode: undetermined"),
    }
    if let Some(applied) = report.last_applied {
        println!("  Last applied: {applied}");
    }
    match (&report.sunrise, &report.sunset, &report.solar_note) {
        (Some(sunrise), Some(sunset), _) => {
            println!("       Sunrise: {sunrise}");
            println!("        Sunset: {sunset}");
        }
        (_, _, Some(note)) => println!("           Sun: {note}"),
        _ => {}
    }
    if let Some(next) = &report.next_transition {
        println!(
            "          Next: {} at {} (in {})",
            next.mode,
            next.fire_at,
            format_duration(chrono::Duration::seconds(next.in_seconds))
        );
    }
    println!("  Armed timers: {} ({})", report.armed.len(), report.backend);
    for entry in &report.armed {
        println!("                {}  {}", entry.key, entry.fire_at.to_rfc3339());
    }
}

/// Display help for the status command
pub fn display_help() {
    log_version!();
    log_block_start!("status - Show the current schedule");
    log_block_start!("Usage: sunshift status [--json]");
    log_block_start!("Options:");
    log_indented!("--json  Print a JSON object instead of text");
    log_block_start!("Description:");
    log_indented!("Shows whether scheduling is enabled, the mode that should be");
    log_indented!("showing now, today's sunrise and sunset, the next transition");
    log_indented!("and every armed timer. Nothing is changed.");
    log_end!();
}
