//! # Sunshift Library
//!
//! Internal library for the sunshift binary.
//!
//! This library exists to enable testing of the scheduling internals and to keep
//! CLI dispatch (main.rs) separate from application logic.
//!
//! ## Architecture
//!
//! - **Scheduling core**: `geo` computes sunrise/sunset with the NOAA equations,
//!   `schedule` plans the lookahead window and drives a [`backend::TimerBackend`]
//!   and a [`backend::Sink`] through [`schedule::TransitionScheduler`]
//! - **Backends**: `backend` with systemd user timers, an in-memory backend and
//!   a command-running sink
//! - **Configuration**: `config` module for TOML-based settings
//! - **Commands**: `commands` module for the CLI subcommands (enable, fire, status, ...)
//! - **Infrastructure**: `io` (lock file, machine id), `time` (clock and local-time
//!   helpers), `logger`, `error`

// Import macros from logger module for use in all submodules
#[macro_use]
pub mod logger;

pub mod args;
pub mod backend;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod geo;
pub mod io;
pub mod schedule;
pub mod time;
