//! Shared time and interval utilities.
//!
//! Everything here is instant-based: wall-clock values are only turned into
//! instants through [`local_instant`], which resolves DST folds and gaps in one
//! place so no caller ever arms a timer on an ambiguous or nonexistent local time.

pub mod source;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Convert a UTC instant to the given zone. Lossless: the instant is unchanged.
pub fn localize(instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    instant.with_timezone(&tz)
}

/// Resolve a local wall-clock time on `date` to a single instant.
///
/// - Ambiguous times (DST fall-back) resolve to the earliest occurrence.
/// - Nonexistent times (DST spring-forward gap) resolve to the first valid
///   instant after the gap, stepping forward one minute at a time.
pub fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    let wall = date.and_time(time);
    if let Some(dt) = tz.from_local_datetime(&wall).earliest() {
        return Some(dt);
    }

    // Gaps are at most a few hours long; three hours covers every zone in the database
    (1..=180)
        .map(|minutes| wall + Duration::minutes(minutes))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
}

/// Truncate an instant to whole seconds.
pub fn truncate_to_second<T: TimeZone>(dt: DateTime<T>) -> DateTime<T> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// All dates from `start` through `end`, inclusive. Empty if `end < start`.
pub fn dates_inclusive(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Parse a datetime string in the format "YYYY-MM-DD HH:MM:SS" in a specific timezone.
pub fn parse_datetime_in_tz(s: &str, tz: Tz) -> Result<DateTime<Tz>, String> {
    let naive = NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|e| format!("Invalid datetime format: {e}. Use YYYY-MM-DD HH:MM:SS"))?;

    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| format!("'{s}' does not exist in timezone {tz} (DST gap)"))
}

/// Format a duration as a compact human-readable string, e.g. `3h 12m`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
