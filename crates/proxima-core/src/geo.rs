//! Great-circle geometry and coordinate validation.
//!
//! All distances are in meters. Every caller in the workspace goes through
//! [`distance_meters`], so there is exactly one unit convention.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Mean Earth radius used by the Haversine formula.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// ─── Coordinate ──────────────────────────────────────────────────────────────

/// A WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
  pub latitude:  f64,
  pub longitude: f64,
}

impl Coordinate {
  /// Null Island. QR admissions carry no GPS claim and are logged here.
  pub const ORIGIN: Self = Self { latitude: 0.0, longitude: 0.0 };

  pub fn new(latitude: f64, longitude: f64) -> Self {
    Self { latitude, longitude }
  }

  /// Range check: latitude in [-90, 90], longitude in [-180, 180].
  pub fn validate(&self) -> Result<()> {
    let in_range = self.latitude.is_finite()
      && self.longitude.is_finite()
      && (-90.0..=90.0).contains(&self.latitude)
      && (-180.0..=180.0).contains(&self.longitude);

    if in_range {
      Ok(())
    } else {
      Err(Error::InvalidCoordinate {
        latitude:  self.latitude,
        longitude: self.longitude,
      })
    }
  }

  /// Textual stand-in used when reverse geocoding is unavailable.
  pub fn fallback_label(&self) -> String {
    format!("lat {:.6}, lng {:.6}", self.latitude, self.longitude)
  }
}

// ─── Operating region ────────────────────────────────────────────────────────

/// A deployment-wide bounding box. Fixes outside it are treated as bogus
/// (emulators, stale test fixtures, spoofing apps defaulting to 0,0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OperatingRegion {
  pub min_latitude:  f64,
  pub max_latitude:  f64,
  pub min_longitude: f64,
  pub max_longitude: f64,
}

impl OperatingRegion {
  pub fn contains(&self, c: Coordinate) -> bool {
    (self.min_latitude..=self.max_latitude).contains(&c.latitude)
      && (self.min_longitude..=self.max_longitude).contains(&c.longitude)
  }
}

/// Validate `c` against the global ranges and, when configured, the
/// operating region.
pub fn validate_coordinate(
  c: Coordinate,
  region: Option<&OperatingRegion>,
) -> Result<()> {
  c.validate()?;
  match region {
    Some(r) if !r.contains(c) => Err(Error::OutsideOperatingRegion {
      latitude:  c.latitude,
      longitude: c.longitude,
    }),
    _ => Ok(()),
  }
}

// ─── Distance & bearing ──────────────────────────────────────────────────────

/// Great-circle distance between `a` and `b` via the Haversine formula.
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
  let phi_a = a.latitude.to_radians();
  let phi_b = b.latitude.to_radians();
  let d_phi = (b.latitude - a.latitude).to_radians();
  let d_lambda = (b.longitude - a.longitude).to_radians();

  let h = (d_phi / 2.0).sin().powi(2)
    + phi_a.cos() * phi_b.cos() * (d_lambda / 2.0).sin().powi(2);
  // Rounding can push `h` a hair outside [0, 1] for antipodal points.
  let h = h.clamp(0.0, 1.0);

  2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Initial bearing from `from` to `to`, in degrees clockwise from north,
/// normalised to `[0, 360)`.
pub fn bearing_degrees(from: Coordinate, to: Coordinate) -> f64 {
  let phi_a = from.latitude.to_radians();
  let phi_b = to.latitude.to_radians();
  let d_lambda = (to.longitude - from.longitude).to_radians();

  let y = d_lambda.sin() * phi_b.cos();
  let x = phi_a.cos() * phi_b.sin() - phi_a.sin() * phi_b.cos() * d_lambda.cos();

  y.atan2(x).to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn seoul() -> Coordinate { Coordinate::new(37.5, 127.0) }

  #[test]
  fn distance_to_self_is_zero() {
    for c in [seoul(), Coordinate::ORIGIN, Coordinate::new(-89.9, 179.9)] {
      assert_eq!(distance_meters(c, c), 0.0);
    }
  }

  #[test]
  fn distance_is_symmetric() {
    let pairs = [
      (seoul(), Coordinate::new(35.1796, 129.0756)),
      (Coordinate::new(51.5, -0.12), Coordinate::new(40.71, -74.0)),
      (Coordinate::new(-33.9, 151.2), Coordinate::new(64.1, -21.9)),
    ];
    for (a, b) in pairs {
      let ab = distance_meters(a, b);
      let ba = distance_meters(b, a);
      assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
    }
  }

  #[test]
  fn seoul_to_busan_is_about_325_km() {
    let busan = Coordinate::new(35.1796, 129.0756);
    let d = distance_meters(seoul(), busan);
    assert!((300_000.0..350_000.0).contains(&d), "got {d}");
  }

  #[test]
  fn one_millidegree_of_latitude_is_about_111_m() {
    let north = Coordinate::new(37.501, 127.0);
    let d = distance_meters(seoul(), north);
    assert!((d - 111.19).abs() < 0.5, "got {d}");
  }

  #[test]
  fn bearing_points_north_and_east() {
    let north = Coordinate::new(38.0, 127.0);
    let east = Coordinate::new(37.5, 128.0);
    assert!(bearing_degrees(seoul(), north).abs() < 1e-9);
    let b = bearing_degrees(seoul(), east);
    assert!((b - 90.0).abs() < 1.0, "got {b}");
  }

  #[test]
  fn out_of_range_coordinates_are_rejected() {
    assert!(Coordinate::new(90.0, 180.0).validate().is_ok());
    assert!(Coordinate::new(-90.0, -180.0).validate().is_ok());
    assert!(Coordinate::new(90.1, 0.0).validate().is_err());
    assert!(Coordinate::new(0.0, -180.5).validate().is_err());
    assert!(Coordinate::new(f64::NAN, 0.0).validate().is_err());
  }

  #[test]
  fn operating_region_rejects_outside_fixes() {
    let korea = OperatingRegion {
      min_latitude:  33.0,
      max_latitude:  39.0,
      min_longitude: 124.0,
      max_longitude: 132.0,
    };
    assert!(validate_coordinate(seoul(), Some(&korea)).is_ok());
    let err = validate_coordinate(Coordinate::ORIGIN, Some(&korea)).unwrap_err();
    assert!(matches!(err, Error::OutsideOperatingRegion { .. }));
    assert!(validate_coordinate(Coordinate::ORIGIN, None).is_ok());
  }

  #[test]
  fn fallback_label_has_six_decimals() {
    assert_eq!(seoul().fallback_label(), "lat 37.500000, lng 127.000000");
  }
}
