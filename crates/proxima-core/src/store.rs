//! Persistence and collaborator traits.
//!
//! [`EngineStore`] is implemented by storage backends (e.g.
//! `proxima-store-sqlite`). [`UserDirectory`] and [`ReverseGeocoder`] are
//! collaborators owned by other parts of the platform; the engine only reads
//! through them.
//!
//! All methods return `Send` futures so the traits can be used in
//! multi-threaded async runtimes (e.g. tokio with `axum`).

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  geo::Coordinate,
  matches::{
    AutoMatch, Match, MatchAttempt, MatchCreation, MatchStatus, NewAutoMatch,
    NewMatch, NewMatchAttempt,
  },
  meetup::{FeatureProfile, FeatureSet, Meeting, NewParticipant, Participant},
  ranking::UserProfile,
  target::{CheckIn, LocationTarget, Membership, NewCheckIn, NewTarget},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Abstraction over the engine's persistence backend.
///
/// Check-ins and match attempts are append-only. Matches and auto-matches
/// are created at most once per unordered pair; implementations must make
/// the "look up, then insert" step atomic.
pub trait EngineStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Targets ───────────────────────────────────────────────────────────

  /// Persist a new location target. `target_id` and timestamps are assigned
  /// by the store.
  fn add_target(
    &self,
    input: NewTarget,
  ) -> impl Future<Output = Result<LocationTarget, Self::Error>> + Send + '_;

  /// Retrieve a target by UUID. Returns `None` if not found.
  fn get_target(
    &self,
    target_id: Uuid,
  ) -> impl Future<Output = Result<Option<LocationTarget>, Self::Error>> + Send + '_;

  /// Replace the geofence (center and radius) of an existing target and bump
  /// `updated_at`. Returns `None` if the target does not exist.
  fn update_geofence(
    &self,
    target_id: Uuid,
    center: Coordinate,
    radius_meters: f64,
  ) -> impl Future<Output = Result<Option<LocationTarget>, Self::Error>> + Send + '_;

  // ── Check-ins: append-only ───────────────────────────────────────────

  /// Append a valid check-in row. `created_at` is set by the store.
  fn record_check_in(
    &self,
    input: NewCheckIn,
  ) -> impl Future<Output = Result<CheckIn, Self::Error>> + Send + '_;

  /// Check-ins at a target, newest first.
  fn check_ins_for_target(
    &self,
    target_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<CheckIn>, Self::Error>> + Send + '_;

  /// A user's check-ins across all targets, newest first.
  fn check_ins_for_user(
    &self,
    user_id: Uuid,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<CheckIn>, Self::Error>> + Send + '_;

  // ── Membership ────────────────────────────────────────────────────────

  fn is_active_member(
    &self,
    user_id: Uuid,
    group_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Insert or reactivate the membership row for the pair.
  fn grant_membership(
    &self,
    user_id: Uuid,
    group_id: Uuid,
  ) -> impl Future<Output = Result<Membership, Self::Error>> + Send + '_;

  // ── Meetings & participants ───────────────────────────────────────────

  fn add_meeting(
    &self,
    title: String,
  ) -> impl Future<Output = Result<Meeting, Self::Error>> + Send + '_;

  fn get_meeting(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<Option<Meeting>, Self::Error>> + Send + '_;

  fn get_participant(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  /// Look up the single participant row of `user_id` in `meeting_id`,
  /// active or not.
  fn find_participant(
    &self,
    user_id: Uuid,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  /// Insert a fresh, active participant.
  fn add_participant(
    &self,
    input: NewParticipant,
  ) -> impl Future<Output = Result<Participant, Self::Error>> + Send + '_;

  /// Mark a previously-left participant active again with a new nickname,
  /// clearing `left_at` and resetting `joined_at`.
  fn reactivate_participant(
    &self,
    participant_id: Uuid,
    nickname: String,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  /// Replace an active participant's nickname; everything else is kept.
  fn rename_participant(
    &self,
    participant_id: Uuid,
    nickname: String,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  /// Mark a participant inactive. Leaving twice keeps the first `left_at`.
  fn deactivate_participant(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Option<Participant>, Self::Error>> + Send + '_;

  // ── Feature profiles ──────────────────────────────────────────────────

  /// Insert or replace the participant's feature profile.
  fn put_feature_profile(
    &self,
    participant_id: Uuid,
    features: FeatureSet,
  ) -> impl Future<Output = Result<FeatureProfile, Self::Error>> + Send + '_;

  fn get_feature_profile(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Option<FeatureProfile>, Self::Error>> + Send + '_;

  /// Profiles of every **active** participant in the meeting.
  fn active_profiles(
    &self,
    meeting_id: Uuid,
  ) -> impl Future<Output = Result<Vec<FeatureProfile>, Self::Error>> + Send + '_;

  // ── Auto-matches ──────────────────────────────────────────────────────

  /// Atomically create the auto-match unless one already exists for the
  /// unordered pair in the meeting. Returns `None` if it already existed.
  fn create_auto_match_if_absent(
    &self,
    input: NewAutoMatch,
  ) -> impl Future<Output = Result<Option<AutoMatch>, Self::Error>> + Send + '_;

  fn auto_matches_for(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AutoMatch>, Self::Error>> + Send + '_;

  fn record_match_attempt(
    &self,
    input: NewMatchAttempt,
  ) -> impl Future<Output = Result<MatchAttempt, Self::Error>> + Send + '_;

  /// Every evaluation recorded for the participant, oldest first.
  fn match_attempts_for(
    &self,
    participant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<MatchAttempt>, Self::Error>> + Send + '_;

  // ── Matches ───────────────────────────────────────────────────────────

  /// Atomically return the non-deleted match for the unordered pair in the
  /// given context, or create a new `Active` one.
  fn create_match_if_absent(
    &self,
    input: NewMatch,
  ) -> impl Future<Output = Result<MatchCreation, Self::Error>> + Send + '_;

  fn get_match(
    &self,
    match_id: Uuid,
  ) -> impl Future<Output = Result<Option<Match>, Self::Error>> + Send + '_;

  /// Move the match forward to `status`. A match already at or past
  /// `status` is left untouched; either way the stored row is returned.
  fn set_match_status(
    &self,
    match_id: Uuid,
    status: MatchStatus,
  ) -> impl Future<Output = Result<Option<Match>, Self::Error>> + Send + '_;

  /// Count one exchanged message. Returns `None` if the match is unknown.
  fn record_match_message(
    &self,
    match_id: Uuid,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<Option<Match>, Self::Error>> + Send + '_;

  /// Move every `Active` match created before `created_before` to `Expired`
  /// (only those with no messages when `require_no_messages`). Returns the
  /// number of matches expired.
  fn expire_matches(
    &self,
    created_before: DateTime<Utc>,
    require_no_messages: bool,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Every non-deleted match in which `user_id` is either party.
  fn matches_for_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Match>, Self::Error>> + Send + '_;
}

// ─── User directory ──────────────────────────────────────────────────────────

/// Read access to user profiles plus the interaction-exclusion list (likes).
pub trait UserDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<UserProfile>, Self::Error>> + Send + '_;

  /// Active members of `group_id` with both age and gender on file, minus
  /// `exclude`, at most `limit` of them.
  fn group_candidates(
    &self,
    group_id: Uuid,
    exclude: Vec<Uuid>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<UserProfile>, Self::Error>> + Send + '_;

  /// Users `user_id` has already liked.
  fn liked_user_ids(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  /// Record that `from` liked `to`. Liking twice is a no-op.
  fn record_like(
    &self,
    from: Uuid,
    to: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn has_liked(
    &self,
    from: Uuid,
    to: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Reverse geocoding ───────────────────────────────────────────────────────

/// Turns a coordinate into a human-readable address. Purely cosmetic: the
/// engine never lets a geocoder failure block a check-in.
pub trait ReverseGeocoder: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn reverse(
    &self,
    at: Coordinate,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;
}
