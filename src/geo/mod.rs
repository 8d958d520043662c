//! Geographic location and sunrise/sunset calculations.
//!
//! ## Module Structure
//!
//! - [`location`]: validated [`Location`] and coordinate parsing (`43.65N`, `-79.38`)
//! - [`solar`]: NOAA-based sunrise/sunset calculation with explicit polar errors
//! - [`timezone`]: system timezone detection used when the config omits one

pub mod location;
pub mod solar;
pub mod timezone;

pub use location::{Axis, Location, parse_coordinate};
pub use solar::{SolarEvent, compute_sun_times, localize, solar_event};
pub use timezone::detect_system_timezone;
