//! Implementation of the enable command.
//!
//! Marks scheduling as enabled in the configuration, arms the lookahead window
//! and reconciles the current mode.

use anyhow::Result;

use crate::args::GlobalOptions;
use crate::io::lock::acquire_lock;

/// Handle the enable command.
pub fn handle_enable_command(options: &GlobalOptions) -> Result<()> {
    log_version!();
    let _lock = acquire_lock()?;

    let context = super::load_context(options)?;
    if !context.config.is_enabled() {
        crate::config::set_enabled(&context.config_path, true)?;
        log_decorated!("Scheduling enabled in {}", context.config_path.display());
    }
    if context.config.apply_command().is_empty() {
        log_warning!("No apply_command configured, transitions will only be recorded");
    }

    let mut scheduler = super::build_scheduler(&context)?;
    log_block_start!("Arming transitions for {}", scheduler.location());

    let report = scheduler.enable(context.now);
    log_decorated!("Mode: {}", super::describe_reconcile(&report.reconcile));
    match scheduler.backend().install_session_hooks() {
        Ok(()) => log_decorated!("Reconciling at login and after resume"),
        Err(e) => log_warning!("Login/resume hooks not installed: {e}"),
    }
    super::finish_apply(report.apply)?;

    let plan = scheduler.plan(context.now);
    if let Some(next) = plan.next_event() {
        log_decorated!(
            "Next: {} at {}",
            next.key,
            next.fire_at.format("%Y-%m-%d %H:%M:%S %Z")
        );
    }
    log_end!();
    Ok(())
}

/// Display help for the enable command
pub fn display_help() {
    log_version!();
    log_block_start!("enable - Turn scheduling on");
    log_block_start!("Usage: sunshift enable");
    log_block_start!("Description:");
    log_indented!("Sets enabled = true in the configuration, arms one systemd user");
    log_indented!("timer per upcoming sunrise and sunset plus a daily replan, and");
    log_indented!("applies the mode that should be showing right now. Login and");
    log_indented!("resume hooks re-apply the mode after the session starts or the");
    log_indented!("machine wakes up.");
    log_pipe!();
    log_indented!("Running it again is harmless: timers already armed at the right");
    log_indented!("instant are left alone.");
    log_block_start!("Examples:");
    log_indented!("# Enable and show what was armed");
    log_indented!("sunshift --debug enable");
    log_end!();
}
