//! Structured logging system with visual formatting.
//!
//! This module provides the logging system used across sunshift. It includes
//! semantic log levels and box-drawing helpers that keep the output of one
//! scheduling cycle visually grouped.
//!
//! The logger supports runtime enable/disable functionality for quiet operation
//! during automated processes or testing, and a separate debug switch that gates
//! `log_debug!` output.

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

static LOGGING_ENABLED: AtomicBool = AtomicBool::new(true);
static DEBUG_ENABLED: AtomicBool = AtomicBool::new(false);

/// Main logging interface providing structured output formatting.
///
/// ## Logging Conventions
///
/// - **`log_block_start!`**: opens a new conceptual block (e.g. "Replanning schedule",
///   "Reconciling mode"). Prints an empty pipe `┃` for spacing, then `┣ message`.
/// - **`log_decorated!`**: a line belonging to the current block, `┣ message`.
/// - **`log_indented!`**: nested details of the previous line, `┃   message`.
/// - **`log_pipe!`**: a single `┃` spacer, mostly before semantic messages.
/// - **`log_version!`** / **`log_end!`**: header and final marker, printed once per run.
/// - **`log_info!`, `log_warning!`, `log_error!`, `log_debug!`**: semantic messages
///   with a colored `[LEVEL]` prefix.
/// - **`log_error_exit!`**: closes the run with an error, `┗[ERROR] message`.
/// - **`log_error_standalone!`**: an error outside any block, for silenced runs.
pub struct Log;

impl Log {
    /// Enable or disable logging temporarily.
    ///
    /// This is useful for quiet operation during automated processes
    /// or testing where log output would interfere with results.
    pub fn set_enabled(enabled: bool) {
        LOGGING_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if logging is currently enabled.
    pub fn is_enabled() -> bool {
        LOGGING_ENABLED.load(Ordering::SeqCst)
    }

    /// Enable or disable `log_debug!` output.
    pub fn set_debug(enabled: bool) {
        DEBUG_ENABLED.store(enabled, Ordering::SeqCst);
    }

    /// Check if debug output is enabled.
    pub fn is_debug() -> bool {
        DEBUG_ENABLED.load(Ordering::SeqCst)
    }

    /// Get the timestamp prefix used while the process clock is pinned.
    ///
    /// Shows `[HH:MM:SS]` of the pinned instant in the system local zone,
    /// or an empty string when running on the real clock.
    pub fn get_timestamp_prefix() -> String {
        // Check this without initializing the time source
        if crate::time::source::is_initialized() && crate::time::source::is_simulated() {
            let now = crate::time::source::now().with_timezone(&chrono::Local);
            format!("[{}] ", now.format("%H:%M:%S"))
        } else {
            String::new()
        }
    }
}

/// Severity shown as a colored `[LEVEL]` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Debug,
    Warning,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "[\x1b[32mINFO\x1b[0m]",
            Level::Debug => "[\x1b[32mDEBUG\x1b[0m]",
            Level::Warning => "[\x1b[33mWARNING\x1b[0m]",
            Level::Error => "[\x1b[31mERROR\x1b[0m]",
        }
    }
}

/// How a line is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Decorated,
    Indented,
    BlockStart,
    Tagged(Level),
    Standalone(Level),
    Exit(Level),
}

/// Render one message with `prefix` in front of every drawn line.
pub fn render(line: Line, prefix: &str, message: &str) -> String {
    match line {
        Line::Decorated => format!("{prefix}┣ {message}\n"),
        Line::Indented => format!("{prefix}┃   {message}\n"),
        Line::BlockStart => format!("{prefix}┃\n{prefix}┣ {message}\n"),
        Line::Tagged(level) => format!("{prefix}┣{} {message}\n", level.tag()),
        Line::Standalone(level) => format!("{prefix}{} {message}\n", level.tag()),
        Line::Exit(level) => format!("{prefix}┃\n{prefix}┗{} {message}\n", level.tag()),
    }
}

/// Format and print a message. Public for macro access.
pub fn emit(line: Line, args: fmt::Arguments<'_>) {
    if !Log::is_enabled() {
        return;
    }
    if line == Line::Tagged(Level::Debug) && !Log::is_debug() {
        return;
    }
    write_output(&render(line, &Log::get_timestamp_prefix(), &args.to_string()));
}

/// Print a fixed marker line such as the header or the end cap.
pub fn emit_marker(marker: &str) {
    if Log::is_enabled() {
        write_output(&format!("{}{marker}\n", Log::get_timestamp_prefix()));
    }
}

// Public function that routes output (needed by macros)
pub fn write_output(text: &str) {
    print!("{text}");
    let _ = std::io::stdout().flush();
}

// # Logging Macros

/// Log a decorated message, typically as part of an existing block or for standalone emphasis.
#[macro_export]
macro_rules! log_decorated {
    ($($arg:tt)+) => {
        $crate::logger::emit($crate::logger::Line::Decorated, format_args!($($arg)+))
    };
}

/// Log an indented message for sub-items or details within a block.
#[macro_export]
macro_rules! log_indented {
    ($($arg:tt)+) => {
        $crate::logger::emit($crate::logger::Line::Indented, format_args!($($arg)+))
    };
}

/// Log a visual pipe separator for vertical spacing.
#[macro_export]
macro_rules! log_pipe {
    () => {
        $crate::logger::emit_marker("┃")
    };
}

/// Log a block start message, initiating a new conceptual block of information.
#[macro_export]
macro_rules! log_block_start {
    ($($arg:tt)+) => {
        $crate::logger::emit($crate::logger::Line::BlockStart, format_args!($($arg)+))
    };
}

/// Log the application version header.
#[macro_export]
macro_rules! log_version {
    () => {
        $crate::logger::emit_marker(concat!("┏ sunshift v", env!("CARGO_PKG_VERSION"), " ━━╸"))
    };
}

/// Log the final termination marker.
#[macro_export]
macro_rules! log_end {
    () => {
        $crate::logger::emit_marker("╹")
    };
}

/// Log a warning message with pipe prefix and yellow-colored text.
#[macro_export]
macro_rules! log_warning {
    ($($arg:tt)+) => {
        $crate::logger::emit(
            $crate::logger::Line::Tagged($crate::logger::Level::Warning),
            format_args!($($arg)+),
        )
    };
}

/// Log an error message without the box-drawing prefix.
#[macro_export]
macro_rules! log_error_standalone {
    ($($arg:tt)+) => {
        $crate::logger::emit(
            $crate::logger::Line::Standalone($crate::logger::Level::Error),
            format_args!($($arg)+),
        )
    };
}

/// Log an error message with pipe prefix and red-colored text.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)+) => {
        $crate::logger::emit(
            $crate::logger::Line::Tagged($crate::logger::Level::Error),
            format_args!($($arg)+),
        )
    };
}

/// Log an error message that terminates the current flow.
#[macro_export]
macro_rules! log_error_exit {
    ($($arg:tt)+) => {
        $crate::logger::emit(
            $crate::logger::Line::Exit($crate::logger::Level::Error),
            format_args!($($arg)+),
        )
    };
}

/// Log an informational message with pipe prefix and green-colored text.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)+) => {
        $crate::logger::emit(
            $crate::logger::Line::Tagged($crate::logger::Level::Info),
            format_args!($($arg)+),
        )
    };
}

/// Log a debug message. Only printed when debug output is enabled.
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)+) => {
        $crate::logger::emit(
            $crate::logger::Line::Tagged($crate::logger::Level::Debug),
            format_args!($($arg)+),
        )
    };
}
