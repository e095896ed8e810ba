//! The engine's error taxonomy.
//!
//! Every variant is recoverable by the caller (retry with corrected input);
//! none is fatal to the process. A GPS admission of an existing member is
//! not an error: see [`crate::geofence::CheckInOutcome::AlreadyMember`].

use proxima_core::matches::MatchStatus;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  Validation(String),

  #[error(
    "{shortfall_meters:.0} m outside the geofence \
     ({distance_meters:.0} m from the center, radius {radius_meters:.0} m)"
  )]
  OutOfRange {
    distance_meters:  f64,
    radius_meters:    f64,
    /// `distance_meters - radius_meters`, for "you are X m away" messaging.
    shortfall_meters: f64,
    /// Direction from the claimed position towards the center.
    bearing_degrees:  f64,
  },

  #[error("QR code expired {age_ms} ms after issuance")]
  Expired { age_ms: i64 },

  #[error("QR signature does not match")]
  InvalidSignature,

  #[error("user {user_id} is not an active member of group {group_id}")]
  NotAMember { user_id: Uuid, group_id: Uuid },

  #[error("user {user_id} does not own target {target_id}")]
  NotOwner { user_id: Uuid, target_id: Uuid },

  #[error("user {user_id} is not a party to match {match_id}")]
  NotAParty { user_id: Uuid, match_id: Uuid },

  #[error("participant {0} has left the meeting")]
  ParticipantInactive(Uuid),

  #[error("cannot move a match from {from} to {to}")]
  InvalidTransition { from: MatchStatus, to: MatchStatus },

  #[error("target not found: {0}")]
  TargetNotFound(Uuid),

  #[error("meeting not found: {0}")]
  MeetingNotFound(Uuid),

  #[error("participant not found: {0}")]
  ParticipantNotFound(Uuid),

  #[error("match not found: {0}")]
  MatchNotFound(Uuid),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("user directory error: {0}")]
  Directory(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }

  pub(crate) fn directory<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Directory(Box::new(e))
  }

  /// True for the "unknown id" family of errors.
  pub fn is_not_found(&self) -> bool {
    matches!(
      self,
      Self::TargetNotFound(_)
        | Self::MeetingNotFound(_)
        | Self::ParticipantNotFound(_)
        | Self::MatchNotFound(_)
        | Self::UserNotFound(_)
    )
  }
}

impl From<proxima_core::Error> for Error {
  fn from(e: proxima_core::Error) -> Self {
    match e {
      proxima_core::Error::InvalidTransition { from, to } => {
        Self::InvalidTransition { from, to }
      }
      other => Self::Validation(other.to_string()),
    }
  }
}

impl From<proxima_qr::Error> for Error {
  fn from(e: proxima_qr::Error) -> Self {
    match e {
      proxima_qr::Error::InvalidSignature => Self::InvalidSignature,
      proxima_qr::Error::Expired { age_ms } => Self::Expired { age_ms },
      other => Self::Validation(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
