//! Application-wide constants: defaults, validation limits and file names.

// # Application Defaults

pub const DEFAULT_ENABLED: bool = true;
pub const DEFAULT_LATITUDE: &str = "43.65N"; // Toronto
pub const DEFAULT_LONGITUDE: &str = "79.38W";
pub const DEFAULT_TIMEZONE: &str = "America/Toronto";
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 7;
pub const DEFAULT_REPLAN_TIME: &str = "00:05:00";
pub const DEFAULT_REPLAN_JITTER_SECS: u32 = 120;
pub const DEFAULT_LATE_FIRE_GRACE_SECS: u32 = 600;

// # Validation Limits

pub const MINIMUM_LOOKAHEAD_DAYS: u32 = 1;
pub const MAXIMUM_LOOKAHEAD_DAYS: u32 = 31;
pub const MAXIMUM_REPLAN_JITTER_SECS: u32 = 3600;
pub const MINIMUM_LATE_FIRE_GRACE_SECS: u32 = 1;
pub const MAXIMUM_LATE_FIRE_GRACE_SECS: u32 = 86_400;

// # Files

pub const CONFIG_DIR_NAME: &str = "sunshift";
pub const CONFIG_FILE_NAME: &str = "sunshift.toml";
pub const LOCK_FILE_NAME: &str = "sunshift.lock";
pub const MACHINE_ID_PATH: &str = "/etc/machine-id";

// # Locking

/// How long a mutating command waits for another instance before giving up.
pub const LOCK_TIMEOUT_MS: u64 = 5_000;
pub const LOCK_RETRY_INTERVAL_MS: u64 = 100;

// # Exit Codes

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
/// The command ran but part of the schedule could not be armed.
pub const EXIT_PARTIAL: i32 = 2;
