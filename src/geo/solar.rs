//! Sunrise and sunset calculation.
//!
//! Uses the NOAA general solar position approximation: a truncated Fourier
//! series for the equation of time and solar declination, and the hour angle
//! at a zenith of 90.833° (geometric horizon plus refraction and the solar
//! radius). Accuracy is within a couple of minutes at mid latitudes.
//!
//! Everything here is a pure function of its inputs and safe to call from any
//! thread.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use super::location::{Location, validate_coordinates};
use crate::error::SolarError;
use crate::time;

/// Zenith of the sun's center at sunrise/sunset, in degrees.
const SUNRISE_ZENITH_DEG: f64 = 90.833;

/// Minutes of UTC time at solar noon on the prime meridian, before corrections.
const NOON_MINUTES: f64 = 720.0;

/// Sunrise and sunset for one date.
///
/// The instants are derived from the UTC day of `date`; for non-polar dates
/// `sunrise_utc < sunset_utc` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarEvent {
    pub date: NaiveDate,
    pub sunrise_utc: DateTime<Utc>,
    pub sunset_utc: DateTime<Utc>,
}

impl SolarEvent {
    /// Sunrise in the given zone.
    pub fn sunrise_in(&self, tz: Tz) -> DateTime<Tz> {
        time::localize(self.sunrise_utc, tz)
    }

    /// Sunset in the given zone.
    pub fn sunset_in(&self, tz: Tz) -> DateTime<Tz> {
        time::localize(self.sunset_utc, tz)
    }

    /// Time between sunrise and sunset.
    pub fn day_length(&self) -> Duration {
        self.sunset_utc - self.sunrise_utc
    }
}

/// Intermediate terms of the solar position approximation.
#[derive(Debug, Clone, Copy)]
struct SolarTerms {
    /// Equation of time, minutes
    eqtime: f64,
    /// Solar declination, radians
    declination: f64,
}

/// Fractional year angle for the start of `date`.
///
/// The reference hour is fixed at midnight since only the date is an input.
fn fractional_year(date: NaiveDate) -> f64 {
    let day_of_year = f64::from(date.ordinal());
    let hour = 0.0;
    2.0 * std::f64::consts::PI / 365.0 * (day_of_year - 1.0 + (hour - 12.0) / 24.0)
}

fn solar_terms(gamma: f64) -> SolarTerms {
    let eqtime = 229.18
        * (0.000075 + 0.001868 * gamma.cos()
            - 0.032077 * gamma.sin()
            - 0.014615 * (2.0 * gamma).cos()
            - 0.040849 * (2.0 * gamma).sin());

    let declination = 0.006918 - 0.399912 * gamma.cos() + 0.070257 * gamma.sin()
        - 0.006758 * (2.0 * gamma).cos()
        + 0.000907 * (2.0 * gamma).sin()
        - 0.002697 * (3.0 * gamma).cos()
        + 0.00148 * (3.0 * gamma).sin();

    SolarTerms {
        eqtime,
        declination,
    }
}

/// Sunrise/sunset hour angle in minutes of time.
fn hour_angle_minutes(latitude: f64, declination: f64, date: NaiveDate) -> Result<f64, SolarError> {
    let lat = latitude.to_radians();
    let numerator = SUNRISE_ZENITH_DEG.to_radians().cos() - lat.sin() * declination.sin();
    let cos_h = numerator / (lat.cos() * declination.cos());

    // At exactly ±90° the denominator can vanish; the sign of the numerator still
    // tells which side of the horizon the sun stays on
    if cos_h > 1.0 || (!cos_h.is_finite() && numerator > 0.0) {
        return Err(SolarError::PolarNight { date, latitude });
    }
    if cos_h < -1.0 || !cos_h.is_finite() {
        return Err(SolarError::PolarDay { date, latitude });
    }

    Ok(4.0 * cos_h.acos().to_degrees())
}

fn utc_midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn minutes_after(base: DateTime<Utc>, minutes: f64) -> DateTime<Utc> {
    base + Duration::milliseconds((minutes * 60_000.0).round() as i64)
}

/// Compute sunrise and sunset for a coordinate pair on a date.
///
/// # Errors
/// - [`SolarError::Validation`] when the coordinates are out of range (checked first)
/// - [`SolarError::PolarNight`] when the sun never rises on `date`
/// - [`SolarError::PolarDay`] when the sun never sets on `date`
pub fn compute_sun_times(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
) -> Result<SolarEvent, SolarError> {
    validate_coordinates(latitude, longitude)?;

    let terms = solar_terms(fractional_year(date));
    let ha_minutes = hour_angle_minutes(latitude, terms.declination, date)?;

    let solar_noon = NOON_MINUTES - 4.0 * longitude - terms.eqtime;
    let midnight = utc_midnight(date);

    Ok(SolarEvent {
        date,
        sunrise_utc: minutes_after(midnight, solar_noon - ha_minutes),
        sunset_utc: minutes_after(midnight, solar_noon + ha_minutes),
    })
}

/// Compute sunrise and sunset for a validated location.
pub fn solar_event(location: &Location, date: NaiveDate) -> Result<SolarEvent, SolarError> {
    compute_sun_times(location.latitude(), location.longitude(), date)
}

/// Convert an instant to a local-aware instant in `tz`.
pub fn localize(instant: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    time::localize(instant, tz)
}
