//! Implementation of the reconcile command.
//!
//! Intended for login hooks and resume-from-suspend: apply whatever mode
//! should be showing now, without touching the armed timers.

use anyhow::Result;

use crate::args::GlobalOptions;
use crate::io::lock::acquire_lock;

/// Handle the reconcile command.
pub fn handle_reconcile_command(options: &GlobalOptions) -> Result<()> {
    log_version!();
    let _lock = acquire_lock()?;

    let context = super::load_context(options)?;
    if !context.config.is_enabled() {
        log_block_start!("Scheduling is disabled, nothing to reconcile");
        log_indented!("Run 'sunshift enable' to turn it on");
        log_end!();
        return Ok(());
    }

    let mut scheduler = super::build_scheduler(&context)?;
    log_block_start!("Reconciling mode for {}", scheduler.location());
    let outcome = scheduler.reconcile_now(context.now);
    log_decorated!("Mode: {}", super::describe_reconcile(&outcome));
    log_end!();
    Ok(())
}

/// Display help for the reconcile command
pub fn display_help() {
    log_version!();
    log_block_start!("reconcile - Apply the mode that should be showing now");
    log_block_start!("Usage: sunshift reconcile");
    log_block_start!("Description:");
    log_indented!("Computes today's sunrise and sunset and applies day or night");
    log_indented!("accordingly. The apply command only runs when the mode differs");
    log_indented!("from the last one applied. Armed timers are not changed.");
    log_pipe!();
    log_indented!("On dates without a sunrise or sunset the last applied mode is");
    log_indented!("kept, or the polar fallback (day for polar day, night otherwise)");
    log_indented!("is applied when nothing was applied yet.");
    log_block_start!("Examples:");
    log_indented!("# Run after login");
    log_indented!("sunshift reconcile");
    log_pipe!();
    log_indented!("# Reconcile as if it were a given local time");
    log_indented!("sunshift --at \"2024-06-21 21:30:00\" reconcile");
    log_end!();
}
