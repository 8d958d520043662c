//! Implementation of the sun command: sunrise and sunset for one date.

use anyhow::Result;
use chrono::NaiveDate;

use crate::args::GlobalOptions;
use crate::geo::{Location, solar_event};
use crate::time::format_duration;

/// Handle the sun command. `date` defaults to today at the configured location.
pub fn handle_sun_command(date: Option<NaiveDate>, options: &GlobalOptions) -> Result<()> {
    log_version!();
    let context = super::load_context(options)?;
    let location = context.location;
    let date = date.unwrap_or_else(|| context.now.with_timezone(&location.timezone()).date_naive());

    log_block_start!("{} at {}", date.format("%A %Y-%m-%d"), location);
    for line in describe_sun(&location, date) {
        log_indented!("{line}");
    }
    log_end!();
    Ok(())
}

/// Human-readable sun times for `date`, one line per item.
pub fn describe_sun(location: &Location, date: NaiveDate) -> Vec<String> {
    let tz = location.timezone();
    match solar_event(location, date) {
        Ok(event) => vec![
            format!("Sunrise:    {}", event.sunrise_in(tz).format("%H:%M:%S %Z")),
            format!("Sunset:     {}", event.sunset_in(tz).format("%H:%M:%S %Z")),
            format!("Day length: {}", format_duration(event.day_length())),
        ],
        Err(reason) => {
            log_warning!("{reason}");
            vec!["No sunrise or sunset on this date".to_string()]
        }
    }
}

/// Display help for the sun command
pub fn display_help() {
    log_version!();
    log_block_start!("sun - Print sunrise and sunset");
    log_block_start!("Usage: sunshift sun [YYYY-MM-DD]");
    log_block_start!("Arguments:");
    log_indented!("date  Local date to compute, defaults to today");
    log_block_start!("Description:");
    log_indented!("Computes sunrise and sunset at the configured location with the");
    log_indented!("NOAA solar equations and prints them in the configured timezone.");
    log_block_start!("Examples:");
    log_indented!("sunshift sun");
    log_indented!("sunshift sun 2024-12-21");
    log_end!();
}
