//! Implementation of the disable command.

use anyhow::Result;

use crate::args::GlobalOptions;
use crate::io::lock::acquire_lock;

/// Handle the disable command: persist `enabled = false` and disarm every timer.
///
/// The current appearance is left as it is.
pub fn handle_disable_command(options: &GlobalOptions) -> Result<()> {
    log_version!();
    let _lock = acquire_lock()?;

    let context = super::load_context(options)?;
    if context.config.is_enabled() {
        crate::config::set_enabled(&context.config_path, false)?;
        log_decorated!("Scheduling disabled in {}", context.config_path.display());
    }

    let mut scheduler = super::build_scheduler(&context)?;
    log_block_start!("Disarming transitions");
    if let Err(e) = scheduler.backend().remove_session_hooks() {
        log_warning!("Login/resume hooks not removed: {e}");
    }
    match scheduler.disable() {
        Ok(disarmed) if disarmed.is_empty() => log_decorated!("No timers were armed"),
        Ok(disarmed) => {
            log_decorated!("Disarmed {} timer(s)", disarmed.len());
            for key in &disarmed {
                log_indented!("{key}");
            }
        }
        Err(error) => {
            let failed = error.failed_keys().join(", ");
            if !failed.is_empty() {
                log_indented!("Still armed: {failed}");
            }
            return Err(error.into());
        }
    }
    log_end!();
    Ok(())
}

/// Display help for the disable command
pub fn display_help() {
    log_version!();
    log_block_start!("disable - Turn scheduling off");
    log_block_start!("Usage: sunshift disable");
    log_block_start!("Description:");
    log_indented!("Sets enabled = false in the configuration and removes every");
    log_indented!("sunshift timer, including the daily replan, along with the");
    log_indented!("login and resume hooks. The current mode is not changed.");
    log_end!();
}
