//! Match records and their lifecycle.
//!
//! Two kinds of match exist: [`AutoMatch`] pairs participants of an instant
//! meetup, and [`Match`] pairs users after a mutual like (optionally inside a
//! group). Both are keyed on an **unordered** pair and are created at most
//! once; neither is ever deleted, only moved forward through [`MatchStatus`].

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result};

/// Order a pair so that `(a, b)` and `(b, a)` produce the same key.
pub fn ordered_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
  if a <= b { (a, b) } else { (b, a) }
}

// ─── AutoMatch ───────────────────────────────────────────────────────────────

/// A blind match between two participants of the same meeting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoMatch {
  pub auto_match_id:   Uuid,
  pub meeting_id:      Uuid,
  pub participant1_id: Uuid,
  pub participant2_id: Uuid,
  pub matched_at:      DateTime<Utc>,
  /// Handed to the chat collaborator, which opens the room.
  pub chat_room_id:    Uuid,
}

impl AutoMatch {
  pub fn involves(&self, participant_id: Uuid) -> bool {
    self.participant1_id == participant_id || self.participant2_id == participant_id
  }
}

/// Input to [`crate::store::EngineStore::create_auto_match_if_absent`].
#[derive(Debug, Clone)]
pub struct NewAutoMatch {
  pub meeting_id:      Uuid,
  pub participant1_id: Uuid,
  pub participant2_id: Uuid,
  pub chat_room_id:    Uuid,
}

/// Telemetry row written once per matching evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchAttempt {
  pub attempt_id:         Uuid,
  pub meeting_id:         Uuid,
  pub participant_id:     Uuid,
  pub potential_matches:  u32,
  pub successful_matches: u32,
  pub created_at:         DateTime<Utc>,
}

/// Input to [`crate::store::EngineStore::record_match_attempt`].
#[derive(Debug, Clone)]
pub struct NewMatchAttempt {
  pub meeting_id:         Uuid,
  pub participant_id:     Uuid,
  pub potential_matches:  u32,
  pub successful_matches: u32,
}

// ─── Match ───────────────────────────────────────────────────────────────────

/// Lifecycle of a general match. Transitions only move forward.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MatchStatus {
  Active,
  Expired,
  Deleted,
}

impl MatchStatus {
  /// Parse the stored text form.
  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownDiscriminant {
      kind:  "match status",
      value: s.to_owned(),
    })
  }

  /// Position in the lifecycle; transitions never decrease it.
  pub fn rank(self) -> u8 {
    match self {
      Self::Active => 0,
      Self::Expired => 1,
      Self::Deleted => 2,
    }
  }

  /// Check that moving from `self` to `next` is allowed. Staying put is
  /// allowed; going backwards never is.
  pub fn check_transition(self, next: Self) -> Result<()> {
    if next.rank() >= self.rank() {
      Ok(())
    } else {
      Err(Error::InvalidTransition { from: self, to: next })
    }
  }
}

/// A match between two users, optionally scoped to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Match {
  pub match_id:        Uuid,
  pub user1_id:        Uuid,
  pub user2_id:        Uuid,
  pub group_id:        Option<Uuid>,
  pub status:          MatchStatus,
  pub message_count:   u32,
  pub last_message_at: Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
}

impl Match {
  pub fn involves(&self, user_id: Uuid) -> bool {
    self.user1_id == user_id || self.user2_id == user_id
  }

  /// The other party, if `user_id` is one of the two.
  pub fn counterpart(&self, user_id: Uuid) -> Option<Uuid> {
    if self.user1_id == user_id {
      Some(self.user2_id)
    } else if self.user2_id == user_id {
      Some(self.user1_id)
    } else {
      None
    }
  }
}

/// Input to [`crate::store::EngineStore::create_match_if_absent`].
#[derive(Debug, Clone)]
pub struct NewMatch {
  pub user_a:   Uuid,
  pub user_b:   Uuid,
  pub group_id: Option<Uuid>,
}

/// The outcome of an idempotent match creation.
#[derive(Debug, Clone)]
pub enum MatchCreation {
  Created(Match),
  Existing(Match),
}

impl MatchCreation {
  pub fn is_created(&self) -> bool { matches!(self, Self::Created(_)) }

  pub fn into_match(self) -> Match {
    match self {
      Self::Created(m) | Self::Existing(m) => m,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ordered_pair_is_orientation_free() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    assert_eq!(ordered_pair(a, b), ordered_pair(b, a));
  }

  #[test]
  fn status_moves_forward_only() {
    use MatchStatus::*;
    assert!(Active.check_transition(Expired).is_ok());
    assert!(Active.check_transition(Deleted).is_ok());
    assert!(Expired.check_transition(Deleted).is_ok());
    assert!(Active.check_transition(Active).is_ok());

    assert!(Expired.check_transition(Active).is_err());
    assert!(Deleted.check_transition(Active).is_err());
    assert!(Deleted.check_transition(Expired).is_err());
  }

  #[test]
  fn status_text_round_trip() {
    assert_eq!(MatchStatus::Expired.to_string(), "expired");
    assert_eq!(MatchStatus::parse("deleted").unwrap(), MatchStatus::Deleted);
    assert!(MatchStatus::parse("zombie").is_err());
  }

  #[test]
  fn counterpart_is_symmetric() {
    let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    let m = Match {
      match_id:        Uuid::new_v4(),
      user1_id:        a,
      user2_id:        b,
      group_id:        None,
      status:          MatchStatus::Active,
      message_count:   0,
      last_message_at: None,
      created_at:      Utc::now(),
    };
    assert_eq!(m.counterpart(a), Some(b));
    assert_eq!(m.counterpart(b), Some(a));
    assert_eq!(m.counterpart(c), None);
  }
}
