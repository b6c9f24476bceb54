//! Geodetic coordinate conversions and local tangent frames.
//!
//! Positions are stored in ECEF (Earth-Centered, Earth-Fixed) meters. Local
//! motion is expressed in an East-North-Up frame built on the WGS84 ellipsoid
//! normal at the vehicle position.
//!
//! Orientation conventions:
//! - heading is clockwise from north (0 = north, π/2 = east)
//! - pitch is positive nose-up
//! - roll is positive right-wing-down
//! - model space is +X right, +Y forward, +Z up

use std::f64::consts::TAU;

use glam::{DMat3, DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

use crate::constants::{WGS84_ECCENTRICITY_SQ, WGS84_SEMI_MAJOR_AXIS_M};

/// Number of fixed-point iterations used when recovering latitude from ECEF.
const GEODETIC_ITERATIONS: usize = 6;

/// A position on (or above) the WGS84 ellipsoid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Geodetic {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Height above the ellipsoid in meters.
    pub height: f64,
}

impl Geodetic {
    pub fn new(longitude: f64, latitude: f64, height: f64) -> Self {
        Self {
            longitude,
            latitude,
            height,
        }
    }

    /// Convert to ECEF meters.
    pub fn to_ecef(self) -> DVec3 {
        geodetic_to_ecef(self)
    }

    /// Same horizontal position with a different height.
    #[must_use]
    pub fn with_height(self, height: f64) -> Self {
        Self { height, ..self }
    }
}

/// Prime vertical radius of curvature at the given latitude (radians).
fn prime_vertical_radius(sin_lat: f64) -> f64 {
    WGS84_SEMI_MAJOR_AXIS_M / (1.0 - WGS84_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt()
}

/// Convert geodetic coordinates to ECEF.
pub fn geodetic_to_ecef(geodetic: Geodetic) -> DVec3 {
    let lat = geodetic.latitude.to_radians();
    let lon = geodetic.longitude.to_radians();
    let (sin_lat, cos_lat) = lat.sin_cos();
    let (sin_lon, cos_lon) = lon.sin_cos();
    let n = prime_vertical_radius(sin_lat);
    let h = geodetic.height;

    DVec3::new(
        (n + h) * cos_lat * cos_lon,
        (n + h) * cos_lat * sin_lon,
        (n * (1.0 - WGS84_ECCENTRICITY_SQ) + h) * sin_lat,
    )
}

/// Convert ECEF to geodetic coordinates.
///
/// Iterates on latitude and uses the pole-stable height formula, so results
/// stay accurate at high latitudes. The Earth's center maps to the origin of
/// latitude/longitude with a height of minus the semi-major axis.
pub fn ecef_to_geodetic(position: DVec3) -> Geodetic {
    let p = position.x.hypot(position.y);
    let z = position.z;

    if p < 1.0e-9 && z.abs() < 1.0e-9 {
        return Geodetic::new(0.0, 0.0, -WGS84_SEMI_MAJOR_AXIS_M);
    }

    let lon = position.y.atan2(position.x);
    let mut lat = z.atan2(p * (1.0 - WGS84_ECCENTRICITY_SQ));
    let mut height = 0.0;

    for _ in 0..GEODETIC_ITERATIONS {
        let (sin_lat, cos_lat) = lat.sin_cos();
        let n = prime_vertical_radius(sin_lat);
        height = p * cos_lat + z * sin_lat
            - WGS84_SEMI_MAJOR_AXIS_M * (1.0 - WGS84_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        lat = z.atan2(p * (1.0 - WGS84_ECCENTRICITY_SQ * n / (n + height)));
    }

    Geodetic::new(lon.to_degrees(), lat.to_degrees(), height)
}

/// Height above the ellipsoid of an ECEF position.
pub fn height_of(position: DVec3) -> f64 {
    ecef_to_geodetic(position).height
}

/// Move an ECEF position vertically so it sits at `height` above the ellipsoid.
pub fn with_height(position: DVec3, height: f64) -> DVec3 {
    ecef_to_geodetic(position).with_height(height).to_ecef()
}

/// Wrap an angle into `[0, 2π)`.
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(TAU);
    // rem_euclid can return TAU for tiny negative inputs.
    if wrapped >= TAU { 0.0 } else { wrapped }
}

/// Unit forward vector in local ENU for a heading.
pub fn heading_to_local(heading: f64) -> DVec3 {
    let (sin_h, cos_h) = heading.sin_cos();
    DVec3::new(sin_h, cos_h, 0.0)
}

/// Rotation from model space into local ENU for the given attitude.
pub fn local_rotation(heading: f64, pitch: f64, roll: f64) -> DQuat {
    DQuat::from_rotation_z(-heading) * DQuat::from_rotation_x(pitch) * DQuat::from_rotation_y(roll)
}

/// East-North-Up tangent frame at a point on the globe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnuFrame {
    /// Frame origin in ECEF.
    pub origin: DVec3,
    /// Local east axis.
    pub east: DVec3,
    /// Local north axis.
    pub north: DVec3,
    /// Local up axis (ellipsoid normal).
    pub up: DVec3,
}

impl EnuFrame {
    /// Build the frame whose origin is the given ECEF position.
    pub fn from_ecef(origin: DVec3) -> Self {
        let geodetic = ecef_to_geodetic(origin);
        let lat = geodetic.latitude.to_radians();
        let lon = geodetic.longitude.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let east = DVec3::new(-sin_lon, cos_lon, 0.0);
        let north = DVec3::new(-sin_lat * cos_lon, -sin_lat * sin_lon, cos_lat);
        let up = DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat);

        Self {
            origin,
            east,
            north,
            up,
        }
    }

    /// Rotate a local direction into ECEF.
    pub fn direction_to_world(&self, local: DVec3) -> DVec3 {
        self.east * local.x + self.north * local.y + self.up * local.z
    }

    /// Transform a local offset into an ECEF position.
    pub fn to_world(&self, local: DVec3) -> DVec3 {
        self.origin + self.direction_to_world(local)
    }

    /// Express an ECEF position as a local offset from the frame origin.
    pub fn to_local(&self, world: DVec3) -> DVec3 {
        let d = world - self.origin;
        DVec3::new(d.dot(self.east), d.dot(self.north), d.dot(self.up))
    }

    /// Rotation taking local ENU vectors to ECEF.
    pub fn rotation(&self) -> DQuat {
        DQuat::from_mat3(&DMat3::from_cols(self.east, self.north, self.up))
    }

    /// Horizontal forward direction in ECEF for a heading.
    pub fn forward(&self, heading: f64) -> DVec3 {
        self.direction_to_world(heading_to_local(heading))
    }
}

/// World (ECEF) rotation of a body with the given attitude at `position`.
pub fn world_rotation(position: DVec3, heading: f64, pitch: f64, roll: f64) -> DQuat {
    EnuFrame::from_ecef(position).rotation() * local_rotation(heading, pitch, roll)
}

/// Model-to-world transform for presentation.
pub fn model_matrix(position: DVec3, heading: f64, pitch: f64, roll: f64) -> DMat4 {
    DMat4::from_rotation_translation(world_rotation(position, heading, pitch, roll), position)
}

#[cfg(test)]
mod tests {
    use std::f64::consts::{FRAC_PI_2, PI};

    use super::*;

    const EPS: f64 = 1.0e-6;

    #[test]
    fn test_geodetic_round_trip() {
        for geodetic in [
            Geodetic::new(11.9746, 57.7089, 100.0),
            Geodetic::new(-74.0, 40.7, -50.0),
            Geodetic::new(179.0, -89.5, 8_000.0),
        ] {
            let back = ecef_to_geodetic(geodetic.to_ecef());
            assert!((back.longitude - geodetic.longitude).abs() < 1.0e-9);
            assert!((back.latitude - geodetic.latitude).abs() < 1.0e-9);
            assert!((back.height - geodetic.height).abs() < 1.0e-4);
        }
    }

    #[test]
    fn test_equator_prime_meridian() {
        let p = geodetic_to_ecef(Geodetic::new(0.0, 0.0, 0.0));
        assert!((p.x - WGS84_SEMI_MAJOR_AXIS_M).abs() < EPS);
        assert!(p.y.abs() < EPS);
        assert!(p.z.abs() < EPS);
    }

    #[test]
    fn test_earth_center_is_finite() {
        let g = ecef_to_geodetic(DVec3::ZERO);
        assert!(g.height.is_finite());
        assert!(g.latitude.is_finite());
    }

    #[test]
    fn test_enu_frame_is_orthonormal() {
        let frame = EnuFrame::from_ecef(Geodetic::new(11.9746, 57.7089, 100.0).to_ecef());
        assert!((frame.east.length() - 1.0).abs() < EPS);
        assert!((frame.north.length() - 1.0).abs() < EPS);
        assert!((frame.up.length() - 1.0).abs() < EPS);
        assert!(frame.east.dot(frame.north).abs() < EPS);
        assert!(frame.east.dot(frame.up).abs() < EPS);
        // Right-handed: east x north = up.
        assert!((frame.east.cross(frame.north) - frame.up).length() < EPS);
    }

    #[test]
    fn test_local_round_trip() {
        let frame = EnuFrame::from_ecef(Geodetic::new(-74.0, 40.7, 10.0).to_ecef());
        let local = DVec3::new(12.0, -3.5, 7.25);
        assert!((frame.to_local(frame.to_world(local)) - local).length() < 1.0e-6);
    }

    #[test]
    fn test_heading_convention() {
        assert!((heading_to_local(0.0) - DVec3::Y).length() < EPS);
        assert!((heading_to_local(FRAC_PI_2) - DVec3::X).length() < EPS);
        assert!((heading_to_local(PI) + DVec3::Y).length() < EPS);
    }

    #[test]
    fn test_local_rotation_axes() {
        // Heading east: model forward maps to local east.
        let q = local_rotation(FRAC_PI_2, 0.0, 0.0);
        assert!((q * DVec3::Y - DVec3::X).length() < EPS);

        // Nose up pitch lifts the forward axis.
        let q = local_rotation(0.0, 0.3, 0.0);
        assert!((q * DVec3::Y).z > 0.0);

        // Positive roll drops the right wing.
        let q = local_rotation(0.0, 0.0, 0.3);
        assert!((q * DVec3::X).z < 0.0);
    }

    #[test]
    fn test_model_matrix_forward_matches_frame() {
        let position = Geodetic::new(11.9746, 57.7089, 100.0).to_ecef();
        let frame = EnuFrame::from_ecef(position);
        let m = model_matrix(position, 1.0, 0.0, 0.0);
        let forward = m.transform_vector3(DVec3::Y);
        assert!((forward - frame.forward(1.0)).length() < EPS);
        assert!((m.transform_point3(DVec3::ZERO) - position).length() < 1.0e-6);
    }

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(-FRAC_PI_2) - 3.0 * FRAC_PI_2).abs() < EPS);
        assert!((wrap_angle(TAU + 0.5) - 0.5).abs() < EPS);
        assert!(wrap_angle(-1.0e-18) < TAU);
    }
}
