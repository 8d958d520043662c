//! System timezone detection.
//!
//! Used when the configuration provides coordinates but no `timezone`. Sources are
//! tried in order: the `TZ` environment variable, the `/etc/localtime` symlink,
//! then the Debian-style `/etc/timezone` file. The first name that resolves to a
//! known IANA zone wins.

use chrono_tz::Tz;
use std::path::Path;

use super::location::parse_timezone;

const ZONEINFO_DIR: &str = "/usr/share/zoneinfo";

/// Detect the system's configured IANA timezone.
pub fn detect_system_timezone() -> Option<Tz> {
    detect_from(
        std::env::var("TZ").ok().as_deref(),
        Path::new("/etc/localtime"),
        Path::new("/etc/timezone"),
    )
}

/// Detection with injectable sources.
pub(crate) fn detect_from(tz_env: Option<&str>, localtime: &Path, timezone_file: &Path) -> Option<Tz> {
    if let Some(raw) = tz_env {
        let name = raw.trim_start_matches(':');
        match parse_timezone(name) {
            Ok(tz) => {
                log_debug!("Using timezone from TZ environment variable: {}", tz.name());
                return Some(tz);
            }
            Err(_) => log_warning!("TZ is set to '{}' which is not a valid timezone name", raw),
        }
    }

    if let Some(tz) = from_localtime_link(localtime) {
        log_debug!("Detected timezone via {}: {}", localtime.display(), tz.name());
        return Some(tz);
    }

    if let Some(tz) = from_timezone_file(timezone_file) {
        log_debug!("Detected timezone via {}: {}", timezone_file.display(), tz.name());
        return Some(tz);
    }

    None
}

fn from_localtime_link(path: &Path) -> Option<Tz> {
    let target = std::fs::read_link(path).ok()?;
    let target = if target.is_absolute() {
        target
    } else {
        path.parent()?.join(target)
    };

    // Relative links look like ../usr/share/zoneinfo/Europe/Paris, so match on
    // the zoneinfo component instead of a prefix
    let text = target.to_string_lossy();
    let marker = ZONEINFO_DIR.trim_start_matches('/');
    let name = text.split_once(marker)?.1.trim_start_matches('/');
    // Some distributions nest zones under posix/ or right/
    let name = name
        .strip_prefix("posix/")
        .or_else(|| name.strip_prefix("right/"))
        .unwrap_or(name);
    parse_timezone(name).ok()
}

fn from_timezone_file(path: &Path) -> Option<Tz> {
    let content = std::fs::read_to_string(path).ok()?;
    let name = content.lines().next()?.split_whitespace().next()?;
    parse_timezone(name).ok()
}
