//! Validated geographic location.
//!
//! A [`Location`] can only exist with in-range coordinates and a resolvable IANA
//! timezone, so nothing downstream (planning, reconciliation, a timer fire)
//! ever has to re-validate configuration.

use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Check latitude/longitude ranges.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    Ok(())
}

/// Resolve an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, ValidationError> {
    Tz::from_str(name.trim()).map_err(|_| ValidationError::UnknownTimezone(name.to_string()))
}

/// Latitude, longitude and timezone of the installation. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Location {
    latitude: f64,
    longitude: f64,
    #[serde(serialize_with = "serialize_tz")]
    timezone: Tz,
}

fn serialize_tz<S: serde::Serializer>(tz: &Tz, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(tz.name())
}

impl Location {
    /// Build a location, rejecting out-of-range coordinates.
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Result<Self, ValidationError> {
        validate_coordinates(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            timezone,
        })
    }

    /// Build a location from a timezone name.
    pub fn from_names(latitude: f64, longitude: f64, timezone: &str) -> Result<Self, ValidationError> {
        Self::new(latitude, longitude, parse_timezone(timezone)?)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ns = if self.latitude >= 0.0 { 'N' } else { 'S' };
        let ew = if self.longitude >= 0.0 { 'E' } else { 'W' };
        write!(
            f,
            "{:.4}°{ns}, {:.4}°{ew} ({})",
            self.latitude.abs(),
            self.longitude.abs(),
            self.timezone.name()
        )
    }
}

/// Which axis a coordinate string is parsed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Axis {
    Latitude,
    Longitude,
}

/// Parse a coordinate written either as a signed decimal (`-79.38`) or with a
/// hemisphere suffix (`79.38W`).
///
/// Hemisphere letters must match the axis: `N`/`S` for latitude, `E`/`W` for
/// longitude. Range checks are left to [`validate_coordinates`].
pub fn parse_coordinate(input: &str, axis: Axis) -> Result<f64, ValidationError> {
    let invalid = || ValidationError::InvalidCoordinate(input.to_string());
    let trimmed = input.trim().to_ascii_uppercase();

    let Some(last) = trimmed.chars().last() else {
        return Err(invalid());
    };

    if !last.is_ascii_alphabetic() {
        let value: f64 = trimmed.parse().map_err(|_| invalid())?;
        return if value.is_finite() { Ok(value) } else { Err(invalid()) };
    }

    let sign = match (axis, last) {
        (Axis::Latitude, 'N') | (Axis::Longitude, 'E') => 1.0,
        (Axis::Latitude, 'S') | (Axis::Longitude, 'W') => -1.0,
        _ => return Err(invalid()),
    };

    let number = trimmed[..trimmed.len() - 1].trim();
    // Hemisphere form carries its sign in the letter
    if number.starts_with(['-', '+']) {
        return Err(invalid());
    }
    let value: f64 = number.parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(sign * value)
}
