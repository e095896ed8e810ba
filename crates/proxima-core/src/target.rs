//! Location targets (groups and meeting places), their check-in audit log,
//! and the memberships that a successful check-in grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, geo::Coordinate};

// ─── Target ──────────────────────────────────────────────────────────────────

/// A geofenced place: a center and a radius. Published targets are immutable
/// except for center/radius updates by their owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationTarget {
  pub target_id:     Uuid,
  pub owner_id:      Uuid,
  pub name:          String,
  pub center:        Coordinate,
  pub radius_meters: f64,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

/// Input to [`crate::store::EngineStore::add_target`]. Identity and
/// timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewTarget {
  pub owner_id:      Uuid,
  pub name:          String,
  pub center:        Coordinate,
  pub radius_meters: f64,
}

/// A geofence radius must be a positive, finite number of meters.
pub fn validate_radius(radius_meters: f64) -> Result<()> {
  if radius_meters.is_finite() && radius_meters > 0.0 {
    Ok(())
  } else {
    Err(Error::InvalidRadius(radius_meters))
  }
}

// ─── Check-ins ───────────────────────────────────────────────────────────────

/// How a user proved presence at a target.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckInMethod {
  Gps,
  Qr,
}

impl CheckInMethod {
  /// Parse the stored text form.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownDiscriminant {
      kind:  "check-in method",
      value: s.to_owned(),
    })
  }
}

/// One admission, written exactly once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
  pub check_in_id:     Uuid,
  pub user_id:         Uuid,
  pub target_id:       Uuid,
  /// [`Coordinate::ORIGIN`] for QR admissions.
  pub coordinate:      Coordinate,
  pub accuracy_meters: Option<f64>,
  pub method:          CheckInMethod,
  pub is_valid:        bool,
  /// Best-effort reverse-geocoded label; never used for verification.
  pub address:         Option<String>,
  pub created_at:      DateTime<Utc>,
}

/// Input to [`crate::store::EngineStore::record_check_in`].
#[derive(Debug, Clone)]
pub struct NewCheckIn {
  pub user_id:         Uuid,
  pub target_id:       Uuid,
  pub coordinate:      Coordinate,
  pub accuracy_meters: Option<f64>,
  pub method:          CheckInMethod,
  pub address:         Option<String>,
}

// ─── Membership ──────────────────────────────────────────────────────────────

/// A user's membership of a location group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub user_id:   Uuid,
  pub group_id:  Uuid,
  pub is_active: bool,
  pub joined_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn radius_must_be_positive_and_finite() {
    assert!(validate_radius(100.0).is_ok());
    assert!(validate_radius(0.0).is_err());
    assert!(validate_radius(-5.0).is_err());
    assert!(validate_radius(f64::INFINITY).is_err());
  }

  #[test]
  fn method_text_form_is_snake_case() {
    assert_eq!(CheckInMethod::Gps.to_string(), "gps");
    assert_eq!("qr".parse::<CheckInMethod>().unwrap(), CheckInMethod::Qr);
    assert_eq!(serde_json::to_string(&CheckInMethod::Qr).unwrap(), "\"qr\"");
  }
}
