//! Command-line argument parsing and processing.
//!
//! This module handles parsing of command-line arguments and provides a clean
//! interface for the main application logic. Global flags may appear anywhere
//! on the command line; the first positional argument selects the command.

use chrono::NaiveDate;

/// Flags shared by every command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalOptions {
    pub debug_enabled: bool,
    pub config_dir: Option<String>,
    /// `--at "YYYY-MM-DD HH:MM:SS"`: pin the clock to a local instant.
    pub at: Option<String>,
}

/// A schedule command selected on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Turn scheduling on and arm the lookahead window
    Enable,
    /// Turn scheduling off and disarm everything
    Disable,
    /// Show the current mode, sun times and armed timers
    Status { json: bool },
    /// Apply the mode that should be showing right now
    Reconcile,
    /// Show what a replan would arm without touching any timers
    Plan,
    /// Entry point for a delivered timer
    Fire { key: String },
    /// Print sunrise and sunset for a date
    Sun { date: Option<NaiveDate> },
}

/// Represents the parsed command-line arguments and their intended actions.
#[derive(Debug, PartialEq)]
pub enum CliAction {
    /// Run a command with these settings
    Run {
        command: Command,
        options: GlobalOptions,
    },
    /// Show detailed help, for one command or in general
    HelpCommand { command: Option<String> },

    /// Display help information and exit
    ShowHelp,
    /// Display version information and exit
    ShowVersion,
    /// Show help due to unknown arguments and exit
    ShowHelpDueToError,
}

/// Result of parsing command-line arguments.
pub struct ParsedArgs {
    pub action: CliAction,
}

const COMMANDS: [&str; 8] = [
    "enable", "disable", "status", "reconcile", "plan", "fire", "sun", "help",
];

impl ParsedArgs {
    /// Parse command-line arguments into a structured result.
    ///
    /// The first item is the program name and is skipped. `--version` takes
    /// precedence over `--help`, which takes precedence over any command.
    pub fn parse<I, S>(args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args_vec: Vec<String> = args
            .into_iter()
            .skip(1)
            .map(|s| s.as_ref().to_string())
            .collect();

        let mut options = GlobalOptions::default();
        let mut display_help = false;
        let mut display_version = false;
        let mut json = false;
        let mut unknown_arg_found = false;
        let mut positionals: Vec<String> = Vec::new();

        let mut i = 0;
        while i < args_vec.len() {
            let arg = &args_vec[i];
            match arg.as_str() {
                "--help" | "-h" => display_help = true,
                "--version" | "-V" | "-v" => display_version = true,
                "--debug" | "-d" => options.debug_enabled = true,
                "--json" => json = true,
                "--config" | "-c" => match args_vec.get(i + 1) {
                    Some(dir) if !dir.starts_with('-') => {
                        options.config_dir = Some(dir.clone());
                        i += 1;
                    }
                    _ => {
                        log_warning!("Missing directory for --config. Usage: --config <directory>");
                        unknown_arg_found = true;
                    }
                },
                "--at" => match args_vec.get(i + 1) {
                    Some(value) if looks_like_datetime(value) => {
                        options.at = Some(value.clone());
                        i += 1;
                    }
                    Some(value) if !value.starts_with('-') => {
                        log_error!("Invalid --at value: '{}'. Use YYYY-MM-DD HH:MM:SS", value);
                        unknown_arg_found = true;
                        i += 1;
                    }
                    _ => {
                        log_warning!("Missing time for --at. Usage: --at \"YYYY-MM-DD HH:MM:SS\"");
                        unknown_arg_found = true;
                    }
                },
                _ if arg.starts_with('-') => {
                    log_warning!("Unknown option: {}", arg);
                    unknown_arg_found = true;
                }
                _ => positionals.push(arg.clone()),
            }
            i += 1;
        }

        if display_version {
            return ParsedArgs {
                action: CliAction::ShowVersion,
            };
        }

        let Some((command, rest)) = positionals.split_first() else {
            let action = if unknown_arg_found {
                CliAction::ShowHelpDueToError
            } else {
                CliAction::ShowHelp
            };
            return ParsedArgs { action };
        };

        if display_help {
            // `sunshift fire --help` shows the help for `fire`
            let action = if COMMANDS.contains(&command.as_str()) && command != "help" {
                CliAction::HelpCommand {
                    command: Some(command.clone()),
                }
            } else {
                CliAction::ShowHelp
            };
            return ParsedArgs { action };
        }

        if unknown_arg_found {
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        if json && command != "status" {
            log_warning!("--json is only supported by the status command");
            return ParsedArgs {
                action: CliAction::ShowHelpDueToError,
            };
        }

        let parsed = match command.as_str() {
            "enable" => no_arguments(command, rest).map(|_| Command::Enable),
            "disable" => no_arguments(command, rest).map(|_| Command::Disable),
            "reconcile" => no_arguments(command, rest).map(|_| Command::Reconcile),
            "plan" => no_arguments(command, rest).map(|_| Command::Plan),
            "status" => no_arguments(command, rest).map(|_| Command::Status { json }),
            "fire" => match rest {
                [key] => Some(Command::Fire { key: key.clone() }),
                [] => {
                    log_warning!("Missing timer key");
                    crate::commands::help::show_command_usage("fire");
                    None
                }
                [_, extra, ..] => {
                    log_error!("Unexpected argument for fire: '{}'", extra);
                    crate::commands::help::show_command_usage("fire");
                    None
                }
            },
            "sun" => match rest {
                [] => Some(Command::Sun { date: None }),
                [date] => match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                    Ok(date) => Some(Command::Sun { date: Some(date) }),
                    Err(_) => {
                        log_error!("Invalid date: '{}'. Use YYYY-MM-DD", date);
                        None
                    }
                },
                [_, extra, ..] => {
                    log_error!("Unexpected argument for sun: '{}'", extra);
                    crate::commands::help::show_command_usage("sun");
                    None
                }
            },
            "help" => {
                return match rest {
                    [] => ParsedArgs {
                        action: CliAction::HelpCommand { command: None },
                    },
                    [topic] => ParsedArgs {
                        action: CliAction::HelpCommand {
                            command: Some(topic.clone()),
                        },
                    },
                    [_, extra, ..] => {
                        log_error!("Unexpected argument for help: '{}'", extra);
                        ParsedArgs {
                            action: CliAction::ShowHelpDueToError,
                        }
                    }
                };
            }
            _ => {
                log_warning!("Unknown command: {}", command);
                None
            }
        };

        let action = match parsed {
            Some(command) => CliAction::Run { command, options },
            None => CliAction::ShowHelpDueToError,
        };
        ParsedArgs { action }
    }

    /// Parse arguments from the process environment.
    pub fn from_env() -> ParsedArgs {
        Self::parse(std::env::args())
    }
}

fn no_arguments(command: &str, rest: &[String]) -> Option<()> {
    match rest.first() {
        None => Some(()),
        Some(extra) => {
            log_error!("Unexpected argument for {}: '{}'", command, extra);
            crate::commands::help::show_command_usage(command);
            None
        }
    }
}

/// Rough shape check for "YYYY-MM-DD HH:MM:SS"; the command parses it for real.
fn looks_like_datetime(s: &str) -> bool {
    s.len() == 19
        && s.chars().nth(4) == Some('-')
        && s.chars().nth(7) == Some('-')
        && s.chars().nth(10) == Some(' ')
        && s.chars().nth(13) == Some(':')
        && s.chars().nth(16) == Some(':')
}

/// Displays version information using custom logger format.
pub fn display_version_info() {
    log_version!();
    log_pipe!();
    println!("┗ {}", env!("CARGO_PKG_DESCRIPTION"));
}

/// Displays custom help message using logger methods.
pub fn display_help() {
    log_version!();
    log_block_start!(env!("CARGO_PKG_DESCRIPTION"));
    log_block_start!("Usage:");
    log_indented!("sunshift [OPTIONS] <COMMAND>");
    log_block_start!("Options:");
    log_indented!("-c, --config <dir>     Use custom configuration directory");
    log_indented!("-d, --debug            Enable detailed debug output");
    log_indented!("    --at <datetime>    Pretend the local time is \"YYYY-MM-DD HH:MM:SS\"");
    log_indented!("-h, --help             Print help information");
    log_indented!("-V, --version          Print version information");
    log_block_start!("Commands:");
    log_indented!("enable                 Turn scheduling on and arm upcoming transitions");
    log_indented!("disable                Turn scheduling off and disarm all timers");
    log_indented!("status [--json]        Show mode, sun times and armed timers");
    log_indented!("reconcile              Apply the mode that should be showing now");
    log_indented!("plan                   Show what would be armed, without arming it");
    log_indented!("fire <key>             Handle a delivered timer (used by systemd)");
    log_indented!("sun [YYYY-MM-DD]       Print sunrise and sunset for a date");
    log_indented!("help [command]         Show detailed help for a command");
    log_end!();
}
