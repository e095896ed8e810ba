//! Error types for `proxima-core`.

use thiserror::Error;

use crate::matches::MatchStatus;

#[derive(Debug, Error)]
pub enum Error {
  #[error("coordinate out of range: lat {latitude}, lng {longitude}")]
  InvalidCoordinate { latitude: f64, longitude: f64 },

  #[error("coordinate outside the operating region: lat {latitude}, lng {longitude}")]
  OutsideOperatingRegion { latitude: f64, longitude: f64 },

  #[error("geofence radius must be a positive number of meters, got {0}")]
  InvalidRadius(f64),

  #[error("cannot move a match from {from} to {to}")]
  InvalidTransition { from: MatchStatus, to: MatchStatus },

  #[error("unknown {kind} discriminant: {value:?}")]
  UnknownDiscriminant { kind: &'static str, value: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
