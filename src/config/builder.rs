//! Configuration file generation and in-place updates.
//!
//! New files are rendered through [`ConfigBuilder`], which keeps comments
//! aligned. Updates rewrite single lines so user comments and ordering survive.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::constants::*;

/// Write a default configuration to `path`, creating parent directories.
///
/// Coordinates default to Toronto; the timezone is the detected system zone
/// when there is one, otherwise the default coordinates' zone.
pub fn create_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }

    let timezone = crate::geo::detect_system_timezone()
        .map(|tz| tz.name().to_string())
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());

    let content = ConfigBuilder::new()
        .add_section("Scheduling")
        .add_setting("enabled", &DEFAULT_ENABLED.to_string(), "Arm sunrise/sunset timers")
        .add_setting(
            "lookahead_days",
            &DEFAULT_LOOKAHEAD_DAYS.to_string(),
            &format!(
                "Days of transitions kept armed ({MINIMUM_LOOKAHEAD_DAYS}-{MAXIMUM_LOOKAHEAD_DAYS})"
            ),
        )
        .add_setting(
            "replan_time",
            &format!("\"{DEFAULT_REPLAN_TIME}\""),
            "Local time of the daily replan (HH:MM:SS)",
        )
        .add_setting(
            "replan_jitter",
            &DEFAULT_REPLAN_JITTER_SECS.to_string(),
            &format!("Random delay added to the replan in seconds (0-{MAXIMUM_REPLAN_JITTER_SECS})"),
        )
        .add_setting(
            "late_fire_grace",
            &DEFAULT_LATE_FIRE_GRACE_SECS.to_string(),
            "Later sunrise/sunset fires are reconciled instead of applied (seconds)",
        )
        .add_section("Location")
        .add_setting(
            "latitude",
            &format!("\"{DEFAULT_LATITUDE}\""),
            "Decimal degrees (-90 to 90) or hemisphere form",
        )
        .add_setting(
            "longitude",
            &format!("\"{DEFAULT_LONGITUDE}\""),
            "Decimal degrees (-180 to 180) or hemisphere form",
        )
        .add_setting(
            "timezone",
            &format!("\"{timezone}\""),
            "IANA timezone, detected from the system when removed",
        )
        .add_section("Appearance")
        .add_setting(
            "# apply_command",
            "[\"my-theme-switcher\"]",
            "Command to run; \"day\" or \"night\" is appended",
        )
        .build();

    fs::write(path, format!("{content}\n"))
        .with_context(|| format!("Failed to write default config to {}", path.display()))?;

    log_block_start!("Created default configuration at {}", path.display());
    log_indented!("Edit latitude, longitude and apply_command to match your setup");
    Ok(())
}

/// Set `enabled` in the file at `path`, keeping the rest of the file intact.
pub fn set_enabled(path: &Path, enabled: bool) -> Result<()> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let value = enabled.to_string();
    let updated = match find_config_line(&content, "enabled") {
        Some(line) => content.replacen(&line, &preserve_comment_formatting(&line, "enabled", &value), 1),
        None => format!("enabled = {value}\n{content}"),
    };

    if updated != content {
        fs::write(path, updated)
            .with_context(|| format!("Failed to write updated config to {}", path.display()))?;
    }
    Ok(())
}

/// Builder for configuration content with aligned comments.
struct ConfigBuilder {
    entries: Vec<ConfigEntry>,
}

enum ConfigEntry {
    Section(String),
    Setting { line: String, comment: String },
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn add_section(mut self, title: &str) -> Self {
        self.entries.push(ConfigEntry::Section(format!("#[{title}]")));
        self
    }

    fn add_setting(mut self, key: &str, value: &str, comment: &str) -> Self {
        self.entries.push(ConfigEntry::Setting {
            line: format!("{key} = {value}"),
            comment: format!("# {comment}"),
        });
        self
    }

    fn build(self) -> String {
        // One space between the longest setting and its comment
        let max_width = self
            .entries
            .iter()
            .filter_map(|entry| match entry {
                ConfigEntry::Setting { line, .. } => Some(line.len()),
                ConfigEntry::Section(_) => None,
            })
            .max()
            .unwrap_or(0)
            + 1;

        let mut result = Vec::new();
        for entry in self.entries {
            match entry {
                ConfigEntry::Section(title) => {
                    if !result.is_empty() {
                        result.push(String::new());
                    }
                    result.push(title);
                }
                ConfigEntry::Setting { line, comment } => {
                    let padding = " ".repeat(max_width - line.len());
                    result.push(format!("{line}{padding}{comment}"));
                }
            }
        }
        result.join("\n")
    }
}

/// Find a config line containing the specified key
pub(crate) fn find_config_line(content: &str, key: &str) -> Option<String> {
    content
        .lines()
        .find(|line| {
            let trimmed = line.trim_start();
            trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='))
        })
        .map(str::to_string)
}

/// Replace the value of a `key = value  # comment` line, keeping the spacing
/// before the comment.
pub(crate) fn preserve_comment_formatting(original_line: &str, key: &str, new_value: &str) -> String {
    let key_value_part = format!("{key} = {new_value}");

    let Some(comment_pos) = original_line.find('#') else {
        return key_value_part;
    };
    let comment_part = &original_line[comment_pos..];
    let before_comment = &original_line[..comment_pos];
    let original_spacing = match before_comment.rfind(|c: char| !c.is_whitespace()) {
        Some(last_non_space) => &before_comment[last_non_space + 1..],
        None => " ",
    };

    format!("{key_value_part}{original_spacing}{comment_part}")
}
