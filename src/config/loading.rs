//! Configuration loading functionality.
//!
//! Handles locating the configuration file, creating a default one on first
//! use, parsing, and applying defaults.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::Config;
use super::validation::validate_config;
use crate::constants::*;

/// Global configuration directory, set once at startup
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
/// This can only be called once, typically at startup.
/// Returns an error if already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

/// Get the custom configuration directory if one was set.
/// Returns None if using the default directory.
pub fn get_custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Path of `sunshift.toml`, honouring `--config`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(custom_dir) = get_custom_config_dir() {
        return Ok(custom_dir.join(CONFIG_FILE_NAME));
    }
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration using automatic path detection.
///
/// This function will create a default configuration file if none exists.
pub fn load() -> Result<Config> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        super::builder::create_default_config(&config_path)
            .context("Failed to create default config during load")?;
    }

    load_from_path(&config_path)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Load configuration from a specific path.
///
/// This version does NOT create a default config if the path doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Config> {
    if !path.exists() {
        anyhow::bail!("Configuration file not found at {}", path.display());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    validate_config(&config)?;
    apply_defaults(&mut config);

    Ok(config)
}

/// Apply default values to configuration fields.
///
/// The timezone is left alone: a missing zone means "detect at startup", and
/// detection has to happen each run since the system zone can change.
pub(crate) fn apply_defaults(config: &mut Config) {
    if config.enabled.is_none() {
        config.enabled = Some(DEFAULT_ENABLED);
    }
    if config.lookahead_days.is_none() {
        config.lookahead_days = Some(DEFAULT_LOOKAHEAD_DAYS);
    }
    if config.replan_time.is_none() {
        config.replan_time = Some(DEFAULT_REPLAN_TIME.to_string());
    }
    if config.replan_jitter.is_none() {
        config.replan_jitter = Some(DEFAULT_REPLAN_JITTER_SECS);
    }
    if config.late_fire_grace.is_none() {
        config.late_fire_grace = Some(DEFAULT_LATE_FIRE_GRACE_SECS);
    }
}
