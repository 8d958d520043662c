//! Configuration system for sunshift.
//!
//! Settings live in `$XDG_CONFIG_HOME/sunshift/sunshift.toml` (or in the
//! directory given with `--config`). A default file is written on first use.
//!
//! ```toml
//! #[Scheduling]
//! enabled = true                  # Arm sunrise/sunset timers
//! lookahead_days = 7              # Days of transitions kept armed (1-31)
//! replan_time = "00:05:00"        # Local time of the daily replan (HH:MM:SS)
//! replan_jitter = 120             # Random delay added to the replan, seconds (0-3600)
//! late_fire_grace = 600           # Later fires are reconciled instead of applied, seconds
//!
//! #[Location]
//! latitude = "43.65N"             # Decimal degrees or hemisphere form
//! longitude = "79.38W"
//! timezone = "America/Toronto"    # IANA name, detected from the system when omitted
//!
//! #[Appearance]
//! apply_command = ["my-theme-switcher"]  # "day" or "night" is appended
//! ```
//!
//! The scheduling core never sees this file: [`Config::location`] and
//! [`Config::schedule_settings`] turn it into validated core types.

pub mod builder;
pub mod loading;
pub mod validation;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::*;
use crate::geo::{Axis, Location, parse_coordinate};
use crate::schedule::ScheduleSettings;

pub use builder::{create_default_config, set_enabled};
pub use loading::{get_config_path, get_custom_config_dir, load, load_from_path, set_config_dir};

/// A coordinate as written in the config: a bare number or a string like `"43.65N"`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Coordinate {
    Degrees(f64),
    Text(String),
}

impl Coordinate {
    /// Resolve to signed decimal degrees.
    pub fn resolve(&self, axis: Axis) -> Result<f64, crate::error::ValidationError> {
        match self {
            Coordinate::Degrees(value) if value.is_finite() => Ok(*value),
            Coordinate::Degrees(value) => Err(crate::error::ValidationError::InvalidCoordinate(value.to_string())),
            Coordinate::Text(text) => parse_coordinate(text, axis),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coordinate::Degrees(value) => write!(f, "{value}"),
            Coordinate::Text(text) => f.write_str(text),
        }
    }
}

/// Configuration structure for sunshift settings.
///
/// All fields are optional in the file; [`loading::apply_defaults`] fills in
/// every missing value right after parsing.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
pub struct Config {
    /// Whether timers should be armed at all.
    pub enabled: Option<bool>,
    pub latitude: Option<Coordinate>,
    pub longitude: Option<Coordinate>,
    /// IANA timezone name. Detected from the system when missing.
    pub timezone: Option<String>,
    pub lookahead_days: Option<u32>,
    /// Local wall-clock time of the daily replan, `HH:MM:SS`.
    pub replan_time: Option<String>,
    /// Upper bound of the replan jitter in seconds.
    pub replan_jitter: Option<u32>,
    /// Seconds after which a delivered sunrise/sunset fire counts as stale.
    pub late_fire_grace: Option<u32>,
    /// Command (argv) that applies a mode; the mode word is appended.
    pub apply_command: Option<Vec<String>>,
}

impl Config {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(DEFAULT_ENABLED)
    }

    /// Build the validated location.
    ///
    /// A missing timezone is detected from the system; if that fails too the
    /// zone falls back to UTC with a warning.
    pub fn location(&self) -> Result<Location> {
        let latitude = self
            .latitude
            .as_ref()
            .context("latitude is not configured")?
            .resolve(Axis::Latitude)?;
        let longitude = self
            .longitude
            .as_ref()
            .context("longitude is not configured")?
            .resolve(Axis::Longitude)?;

        let location = match self.timezone.as_deref() {
            Some(name) => Location::from_names(latitude, longitude, name)?,
            None => {
                let tz = crate::geo::detect_system_timezone().unwrap_or_else(|| {
                    log_warning!("Could not detect the system timezone, using UTC");
                    chrono_tz::UTC
                });
                Location::new(latitude, longitude, tz)?
            }
        };
        Ok(location)
    }

    /// Scheduling tunables, with `jitter_salt` mixed into the replan jitter.
    pub fn schedule_settings(&self, jitter_salt: u64) -> Result<ScheduleSettings> {
        let replan_time = self.replan_time.as_deref().unwrap_or(DEFAULT_REPLAN_TIME);
        let replan_time = NaiveTime::parse_from_str(replan_time, "%H:%M:%S")
            .with_context(|| format!("invalid replan_time '{replan_time}', use HH:MM:SS"))?;

        Ok(ScheduleSettings {
            lookahead_days: self.lookahead_days.unwrap_or(DEFAULT_LOOKAHEAD_DAYS),
            replan_time,
            replan_jitter: Duration::seconds(i64::from(
                self.replan_jitter.unwrap_or(DEFAULT_REPLAN_JITTER_SECS),
            )),
            jitter_salt,
            late_fire_grace: Duration::seconds(i64::from(
                self.late_fire_grace.unwrap_or(DEFAULT_LATE_FIRE_GRACE_SECS),
            )),
        })
    }

    pub fn apply_command(&self) -> &[String] {
        self.apply_command.as_deref().unwrap_or_default()
    }

    /// Print the effective configuration.
    pub fn log_config(&self) {
        log_block_start!("Loaded configuration from {}", describe_source());
        if let (Some(lat), Some(lon)) = (&self.latitude, &self.longitude) {
            log_indented!("Location: {lat}, {lon}");
        }
        match &self.timezone {
            Some(tz) => log_indented!("Timezone: {tz}"),
            None => log_indented!("Timezone: detected from system"),
        }
        log_indented!(
            "Scheduling: {}",
            if self.is_enabled() { "enabled" } else { "disabled" }
        );
        log_indented!(
            "Lookahead: {} days",
            self.lookahead_days.unwrap_or(DEFAULT_LOOKAHEAD_DAYS)
        );
        log_indented!(
            "Replan: {} (+ up to {}s)",
            self.replan_time.as_deref().unwrap_or(DEFAULT_REPLAN_TIME),
            self.replan_jitter.unwrap_or(DEFAULT_REPLAN_JITTER_SECS)
        );
        match self.apply_command() {
            [] => log_indented!("Apply command: (none)"),
            argv => log_indented!("Apply command: {}", argv.join(" ")),
        }
    }
}

fn describe_source() -> String {
    get_config_path()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|_| "default location".to_string())
}
