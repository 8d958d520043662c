//! Main application entry point.
//!
//! Parses the command line, configures logging and the configuration
//! directory, and dispatches to one of the short-lived commands in
//! [`sunshift::commands`]. Nothing here stays resident: timers are held by
//! systemd, and each delivered timer starts a fresh `sunshift fire <key>`.
//!
//! Exit codes: 0 on success, 1 on failure, 2 when part of the schedule could
//! not be armed or disarmed.

use anyhow::Result;

use sunshift::args::{self, CliAction, Command, GlobalOptions, ParsedArgs};
use sunshift::commands;
use sunshift::constants::*;
use sunshift::error::ApplyError;
use sunshift::logger::Log;
use sunshift::{log_end, log_error_exit, log_error_standalone};

fn main() {
    let parsed_args = ParsedArgs::from_env();

    let result = match parsed_args.action {
        CliAction::ShowVersion => {
            args::display_version_info();
            Ok(())
        }
        CliAction::ShowHelp => {
            args::display_help();
            Ok(())
        }
        CliAction::ShowHelpDueToError => {
            args::display_help();
            std::process::exit(EXIT_FAILURE);
        }
        CliAction::HelpCommand { command } => commands::help::run_help_command(command.as_deref()),
        CliAction::Run { command, options } => run_command(command, &options),
    };

    let code = match result {
        Ok(()) => EXIT_SUCCESS,
        Err(error) => report_failure(&error),
    };
    std::process::exit(code);
}

fn run_command(command: Command, options: &GlobalOptions) -> Result<()> {
    Log::set_debug(options.debug_enabled);
    sunshift::config::set_config_dir(options.config_dir.clone())?;

    match command {
        Command::Enable => commands::enable::handle_enable_command(options),
        Command::Disable => commands::disable::handle_disable_command(options),
        Command::Status { json } => commands::status::handle_status_command(options, json),
        Command::Reconcile => commands::reconcile::handle_reconcile_command(options),
        Command::Plan => commands::plan::handle_plan_command(options),
        Command::Fire { key } => commands::fire::handle_fire_command(&key, options),
        Command::Sun { date } => commands::sun::handle_sun_command(date, options),
    }
}

/// Log a command failure and pick the exit code.
fn report_failure(error: &anyhow::Error) -> i32 {
    if Log::is_enabled() {
        log_error_exit!("{error:#}");
        log_end!();
    } else {
        // Output was silenced for machine-readable mode; still say what went wrong
        Log::set_enabled(true);
        log_error_standalone!("{error:#}");
    }

    match error.downcast_ref::<ApplyError>() {
        Some(ApplyError::Partial { .. }) => EXIT_PARTIAL,
        _ => EXIT_FAILURE,
    }
}
