//! Configuration validation functionality.
//!
//! Rejects values the scheduler cannot work with before any timer is touched,
//! so a broken config never half-applies.

use anyhow::{Context, Result};
use chrono::NaiveTime;

use super::Config;
use crate::constants::*;
use crate::geo::Axis;
use crate::geo::location::{parse_timezone, validate_coordinates};

/// Validate every field that is present.
pub fn validate_config(config: &Config) -> Result<()> {
    let latitude = config
        .latitude
        .as_ref()
        .map(|c| c.resolve(Axis::Latitude))
        .transpose()
        .context("Invalid latitude")?;
    let longitude = config
        .longitude
        .as_ref()
        .map(|c| c.resolve(Axis::Longitude))
        .transpose()
        .context("Invalid longitude")?;

    match (latitude, longitude) {
        (Some(lat), Some(lon)) => validate_coordinates(lat, lon)?,
        (None, None) => anyhow::bail!("latitude and longitude must be configured"),
        _ => anyhow::bail!("latitude and longitude must be configured together"),
    }

    if let Some(name) = &config.timezone {
        parse_timezone(name)?;
    }

    if let Some(days) = config.lookahead_days
        && !(MINIMUM_LOOKAHEAD_DAYS..=MAXIMUM_LOOKAHEAD_DAYS).contains(&days)
    {
        anyhow::bail!(
            "lookahead_days ({}) must be between {} and {}",
            days,
            MINIMUM_LOOKAHEAD_DAYS,
            MAXIMUM_LOOKAHEAD_DAYS
        );
    }

    if let Some(time) = &config.replan_time {
        NaiveTime::parse_from_str(time, "%H:%M:%S")
            .with_context(|| format!("Invalid replan_time '{time}'. Use HH:MM:SS format"))?;
    }

    if let Some(jitter) = config.replan_jitter
        && jitter > MAXIMUM_REPLAN_JITTER_SECS
    {
        anyhow::bail!(
            "replan_jitter ({} s) must be at most {} seconds",
            jitter,
            MAXIMUM_REPLAN_JITTER_SECS
        );
    }

    if let Some(grace) = config.late_fire_grace
        && !(MINIMUM_LATE_FIRE_GRACE_SECS..=MAXIMUM_LATE_FIRE_GRACE_SECS).contains(&grace)
    {
        anyhow::bail!(
            "late_fire_grace ({} s) must be between {} and {} seconds",
            grace,
            MINIMUM_LATE_FIRE_GRACE_SECS,
            MAXIMUM_LATE_FIRE_GRACE_SECS
        );
    }

    if let Some(argv) = &config.apply_command
        && argv.first().is_none_or(|program| program.trim().is_empty())
    {
        anyhow::bail!("apply_command must name a program, e.g. [\"my-theme-switcher\"]");
    }

    Ok(())
}
