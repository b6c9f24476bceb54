//! Shared physical and geodetic constants.

/// WGS84 semi-major axis in meters.
pub const WGS84_SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;

/// WGS84 flattening.
pub const WGS84_FLATTENING: f64 = 1.0 / 298.257_223_563;

/// WGS84 first eccentricity squared.
pub const WGS84_ECCENTRICITY_SQ: f64 = WGS84_FLATTENING * (2.0 - WGS84_FLATTENING);

/// Standard gravity in m/s².
pub const GRAVITY: f64 = 9.81;

/// Speeds below this magnitude (m/s) are treated as stationary.
pub const STATIONARY_SPEED: f64 = 1.0e-3;
