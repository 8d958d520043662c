//! Help command implementation for sunshift.
//!
//! This module provides a dispatcher for the help command that shows
//! command-specific help or general help based on the arguments provided.

use anyhow::Result;

/// Show brief usage for a command (used for error messages)
pub fn show_command_usage(command: &str) {
    match command {
        "enable" => log_block_start!("Usage: sunshift enable"),
        "disable" => log_block_start!("Usage: sunshift disable"),
        "status" => log_block_start!("Usage: sunshift status [--json]"),
        "reconcile" => log_block_start!("Usage: sunshift reconcile"),
        "plan" => log_block_start!("Usage: sunshift plan"),
        "fire" => log_block_start!("Usage: sunshift fire <key>"),
        "sun" => log_block_start!("Usage: sunshift sun [YYYY-MM-DD]"),
        _ => log_block_start!("Usage: sunshift [OPTIONS] <COMMAND>"),
    }
}

/// Run the help command (dispatcher)
///
/// # Arguments
/// * `command` - Optional command name to get help for (None = general help)
pub fn run_help_command(command: Option<&str>) -> Result<()> {
    match command {
        None => display_general_help(),
        Some("enable") => super::enable::display_help(),
        Some("disable") => super::disable::display_help(),
        Some("status") => super::status::display_help(),
        Some("reconcile") => super::reconcile::display_help(),
        Some("plan") => super::plan::display_help(),
        Some("fire") => super::fire::display_help(),
        Some("sun") => super::sun::display_help(),
        Some("help") => display_help_help(),
        Some(unknown) => {
            log_warning!("Unknown command: {}", unknown);
            display_general_help();
        }
    }
    Ok(())
}

/// Display general help focused on commands (for the help command)
fn display_general_help() {
    log_version!();
    log_block_start!("Available Commands:");
    log_indented!("enable               Turn scheduling on and arm upcoming transitions");
    log_indented!("disable              Turn scheduling off and disarm all timers");
    log_indented!("status [--json]      Show mode, sun times and armed timers");
    log_indented!("reconcile            Apply the mode that should be showing now");
    log_indented!("plan                 Show what would be armed, without arming it");
    log_indented!("fire <key>           Handle a delivered timer");
    log_indented!("sun [YYYY-MM-DD]     Print sunrise and sunset for a date");
    log_indented!("help [COMMAND]       Show detailed help for a command");
    log_pipe!();
    log_info!("Use 'sunshift help <command>' to see detailed help for a specific command.");
    log_indented!("Use 'sunshift --help' to see all options and general usage.");
    log_end!();
}

/// Display help for the help command itself
fn display_help_help() {
    log_version!();
    log_block_start!("help - Display help information");
    log_block_start!("Usage: sunshift help [COMMAND]");
    log_block_start!("Arguments:");
    log_indented!("COMMAND  Optional command to get help for");
    log_indented!("         If omitted, shows general help");
    log_block_start!("Examples:");
    log_indented!("# Show general help");
    log_indented!("sunshift help");
    log_pipe!();
    log_indented!("# Show help for specific commands");
    log_indented!("sunshift help enable");
    log_indented!("sunshift help fire");
    log_end!();
}
