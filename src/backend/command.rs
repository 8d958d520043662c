//! Sink that runs a user-configured command.
//!
//! The mode word (`day` or `night`) is appended to the configured argv, so
//! `apply_command = ["my-theme-switcher", "--mode"]` runs
//! `my-theme-switcher --mode night` at sunset. After a successful run the mode
//! is written to a small state file, which is how a later process (every timer
//! fire is a fresh process) learns what is already showing.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::Sink;
use crate::error::SinkError;
use crate::schedule::Mode;

pub struct CommandSink {
    argv: Vec<String>,
    state_file: Option<PathBuf>,
}

impl CommandSink {
    pub fn new(argv: Vec<String>, state_file: Option<PathBuf>) -> Self {
        Self { argv, state_file }
    }

    /// `$XDG_STATE_HOME/sunshift/mode`, or the local data dir where there is no state dir.
    pub fn default_state_file() -> Option<PathBuf> {
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .map(|dir| dir.join("sunshift").join("mode"))
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.state_file.as_deref()
    }

    fn persist(&self, mode: Mode) -> Result<(), SinkError> {
        let Some(path) = &self.state_file else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, format!("{mode}\n"))?;
        Ok(())
    }
}

impl Sink for CommandSink {
    fn apply_mode(&mut self, mode: Mode) -> Result<(), SinkError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(SinkError::NotConfigured);
        };

        log_debug!("Running {} {} {mode}", program, args.join(" "));
        let output = Command::new(program).args(args).arg(mode.as_str()).output()?;

        if !output.status.success() {
            return Err(SinkError::Command {
                command: self.argv.join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        self.persist(mode)
    }

    fn active_mode(&self) -> Option<Mode> {
        let path = self.state_file.as_ref()?;
        match fs::read_to_string(path) {
            Ok(content) => content.parse().ok(),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                log_warning!("Cannot read {}: {e}", path.display());
                None
            }
        }
    }
}
