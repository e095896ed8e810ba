//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that text order is time order. Feature
//! descriptions are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use proxima_core::{
  geo::Coordinate,
  matches::{AutoMatch, Match, MatchAttempt, MatchStatus},
  meetup::{FeatureProfile, Features, Meeting, Participant},
  ranking::UserProfile,
  target::{CheckIn, CheckInMethod, LocationTarget, Membership},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<&str>) -> Result<Option<Uuid>> {
  s.map(decode_uuid).transpose()
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Features ────────────────────────────────────────────────────────────────

pub fn encode_features(f: &Features) -> Result<String> {
  Ok(serde_json::to_string(f)?)
}

pub fn decode_features(s: &str) -> Result<Features> { Ok(serde_json::from_str(s)?) }

// ─── Counters ────────────────────────────────────────────────────────────────

fn decode_count(n: i64) -> u32 { u32::try_from(n.max(0)).unwrap_or(u32::MAX) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `targets` row.
pub struct RawTarget {
  pub target_id:     String,
  pub owner_id:      String,
  pub name:          String,
  pub latitude:      f64,
  pub longitude:     f64,
  pub radius_meters: f64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawTarget {
  pub const COLUMNS: &'static str = "target_id, owner_id, name, latitude, longitude, \
                                     radius_meters, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      target_id:     row.get(0)?,
      owner_id:      row.get(1)?,
      name:          row.get(2)?,
      latitude:      row.get(3)?,
      longitude:     row.get(4)?,
      radius_meters: row.get(5)?,
      created_at:    row.get(6)?,
      updated_at:    row.get(7)?,
    })
  }

  pub fn into_target(self) -> Result<LocationTarget> {
    Ok(LocationTarget {
      target_id:     decode_uuid(&self.target_id)?,
      owner_id:      decode_uuid(&self.owner_id)?,
      name:          self.name,
      center:        Coordinate::new(self.latitude, self.longitude),
      radius_meters: self.radius_meters,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from a `check_ins` row.
pub struct RawCheckIn {
  pub check_in_id:     String,
  pub user_id:         String,
  pub target_id:       String,
  pub latitude:        f64,
  pub longitude:       f64,
  pub accuracy_meters: Option<f64>,
  pub method:          String,
  pub is_valid:        bool,
  pub address:         Option<String>,
  pub created_at:      String,
}

impl RawCheckIn {
  pub const COLUMNS: &'static str = "check_in_id, user_id, target_id, latitude, longitude, \
                                     accuracy_meters, method, is_valid, address, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      check_in_id:     row.get(0)?,
      user_id:         row.get(1)?,
      target_id:       row.get(2)?,
      latitude:        row.get(3)?,
      longitude:       row.get(4)?,
      accuracy_meters: row.get(5)?,
      method:          row.get(6)?,
      is_valid:        row.get(7)?,
      address:         row.get(8)?,
      created_at:      row.get(9)?,
    })
  }

  pub fn into_check_in(self) -> Result<CheckIn> {
    Ok(CheckIn {
      check_in_id:     decode_uuid(&self.check_in_id)?,
      user_id:         decode_uuid(&self.user_id)?,
      target_id:       decode_uuid(&self.target_id)?,
      coordinate:      Coordinate::new(self.latitude, self.longitude),
      accuracy_meters: self.accuracy_meters,
      method:          CheckInMethod::parse(&self.method)?,
      is_valid:        self.is_valid,
      address:         self.address,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `memberships` row.
pub struct RawMembership {
  pub user_id:   String,
  pub group_id:  String,
  pub is_active: bool,
  pub joined_at: String,
}

impl RawMembership {
  pub fn into_membership(self) -> Result<Membership> {
    Ok(Membership {
      user_id:   decode_uuid(&self.user_id)?,
      group_id:  decode_uuid(&self.group_id)?,
      is_active: self.is_active,
      joined_at: decode_dt(&self.joined_at)?,
    })
  }
}

/// Raw strings read directly from a `meetings` row.
pub struct RawMeeting {
  pub meeting_id: String,
  pub title:      String,
  pub created_at: String,
}

impl RawMeeting {
  pub fn into_meeting(self) -> Result<Meeting> {
    Ok(Meeting {
      meeting_id: decode_uuid(&self.meeting_id)?,
      title:      self.title,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `participants` row.
pub struct RawParticipant {
  pub participant_id: String,
  pub user_id:        String,
  pub meeting_id:     String,
  pub nickname:       String,
  pub is_active:      bool,
  pub joined_at:      String,
  pub left_at:        Option<String>,
}

impl RawParticipant {
  pub const COLUMNS: &'static str =
    "participant_id, user_id, meeting_id, nickname, is_active, joined_at, left_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      participant_id: row.get(0)?,
      user_id:        row.get(1)?,
      meeting_id:     row.get(2)?,
      nickname:       row.get(3)?,
      is_active:      row.get(4)?,
      joined_at:      row.get(5)?,
      left_at:        row.get(6)?,
    })
  }

  pub fn into_participant(self) -> Result<Participant> {
    Ok(Participant {
      participant_id: decode_uuid(&self.participant_id)?,
      user_id:        decode_uuid(&self.user_id)?,
      meeting_id:     decode_uuid(&self.meeting_id)?,
      nickname:       self.nickname,
      is_active:      self.is_active,
      joined_at:      decode_dt(&self.joined_at)?,
      left_at:        decode_opt_dt(self.left_at.as_deref())?,
    })
  }
}

/// Raw strings read directly from a `feature_profiles` row.
pub struct RawFeatureProfile {
  pub participant_id: String,
  pub my_features:    String,
  pub looking_for:    String,
  pub updated_at:     String,
}

impl RawFeatureProfile {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      participant_id: row.get(0)?,
      my_features:    row.get(1)?,
      looking_for:    row.get(2)?,
      updated_at:     row.get(3)?,
    })
  }

  pub fn into_profile(self) -> Result<FeatureProfile> {
    Ok(FeatureProfile {
      participant_id: decode_uuid(&self.participant_id)?,
      my_features:    decode_features(&self.my_features)?,
      looking_for:    decode_features(&self.looking_for)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `auto_matches` row.
pub struct RawAutoMatch {
  pub auto_match_id:   String,
  pub meeting_id:      String,
  pub participant1_id: String,
  pub participant2_id: String,
  pub chat_room_id:    String,
  pub matched_at:      String,
}

impl RawAutoMatch {
  pub const COLUMNS: &'static str =
    "auto_match_id, meeting_id, participant1_id, participant2_id, chat_room_id, matched_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      auto_match_id:   row.get(0)?,
      meeting_id:      row.get(1)?,
      participant1_id: row.get(2)?,
      participant2_id: row.get(3)?,
      chat_room_id:    row.get(4)?,
      matched_at:      row.get(5)?,
    })
  }

  pub fn into_auto_match(self) -> Result<AutoMatch> {
    Ok(AutoMatch {
      auto_match_id:   decode_uuid(&self.auto_match_id)?,
      meeting_id:      decode_uuid(&self.meeting_id)?,
      participant1_id: decode_uuid(&self.participant1_id)?,
      participant2_id: decode_uuid(&self.participant2_id)?,
      matched_at:      decode_dt(&self.matched_at)?,
      chat_room_id:    decode_uuid(&self.chat_room_id)?,
    })
  }
}

/// Raw values read back from a `match_attempts` row.
pub struct RawMatchAttempt {
  pub attempt_id:         String,
  pub meeting_id:         String,
  pub participant_id:     String,
  pub potential_matches:  i64,
  pub successful_matches: i64,
  pub created_at:         String,
}

impl RawMatchAttempt {
  pub const COLUMNS: &'static str =
    "attempt_id, meeting_id, participant_id, potential_matches, successful_matches, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      attempt_id:         row.get(0)?,
      meeting_id:         row.get(1)?,
      participant_id:     row.get(2)?,
      potential_matches:  row.get(3)?,
      successful_matches: row.get(4)?,
      created_at:         row.get(5)?,
    })
  }

  pub fn into_attempt(self) -> Result<MatchAttempt> {
    Ok(MatchAttempt {
      attempt_id:         decode_uuid(&self.attempt_id)?,
      meeting_id:         decode_uuid(&self.meeting_id)?,
      participant_id:     decode_uuid(&self.participant_id)?,
      potential_matches:  decode_count(self.potential_matches),
      successful_matches: decode_count(self.successful_matches),
      created_at:         decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `matches` row.
pub struct RawMatch {
  pub match_id:        String,
  pub user1_id:        String,
  pub user2_id:        String,
  pub group_id:        Option<String>,
  pub status:          String,
  pub message_count:   i64,
  pub last_message_at: Option<String>,
  pub created_at:      String,
}

impl RawMatch {
  pub const COLUMNS: &'static str = "match_id, user1_id, user2_id, group_id, status, \
                                     message_count, last_message_at, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      match_id:        row.get(0)?,
      user1_id:        row.get(1)?,
      user2_id:        row.get(2)?,
      group_id:        row.get(3)?,
      status:          row.get(4)?,
      message_count:   row.get(5)?,
      last_message_at: row.get(6)?,
      created_at:      row.get(7)?,
    })
  }

  pub fn into_match(self) -> Result<Match> {
    Ok(Match {
      match_id:        decode_uuid(&self.match_id)?,
      user1_id:        decode_uuid(&self.user1_id)?,
      user2_id:        decode_uuid(&self.user2_id)?,
      group_id:        decode_opt_uuid(self.group_id.as_deref())?,
      status:          MatchStatus::parse(&self.status)?,
      message_count:   decode_count(self.message_count),
      last_message_at: decode_opt_dt(self.last_message_at.as_deref())?,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:        String,
  pub nickname:       String,
  pub bio:            Option<String>,
  pub age:            Option<i64>,
  pub gender:         Option<String>,
  pub profile_image:  Option<String>,
  pub last_active_at: Option<String>,
}

impl RawUser {
  pub const COLUMNS: &'static str =
    "user_id, nickname, bio, age, gender, profile_image, last_active_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:        row.get(0)?,
      nickname:       row.get(1)?,
      bio:            row.get(2)?,
      age:            row.get(3)?,
      gender:         row.get(4)?,
      profile_image:  row.get(5)?,
      last_active_at: row.get(6)?,
    })
  }

  pub fn into_profile(self) -> Result<UserProfile> {
    Ok(UserProfile {
      user_id:        decode_uuid(&self.user_id)?,
      nickname:       self.nickname,
      bio:            self.bio,
      age:            self.age.and_then(|a| u8::try_from(a).ok()),
      gender:         self.gender,
      profile_image:  self.profile_image,
      last_active_at: decode_opt_dt(self.last_active_at.as_deref())?,
    })
  }
}
