//! Compatibility scoring for discovery, and the anonymized candidate shape
//! returned to clients.
//!
//! A score is built from additive terms on top of [`BASE_SCORE`]:
//!
//! | Term | Range |
//! |------|-------|
//! | age compatibility | 0 – 25 |
//! | recency of activity | 0, 5, 10, 15, 20 |
//! | profile completeness | 0 – 15 |
//! | exploration noise | `U(0, max_noise)` |
//!
//! and finally clamped to `[0, 100]` and rounded.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BASE_SCORE: f64 = 50.0;
pub const MAX_AGE_TERM: f64 = 25.0;
pub const DEFAULT_MAX_NOISE: f64 = 10.0;

// ─── Directory view ──────────────────────────────────────────────────────────

/// The slice of a user's profile the ranker reads from the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
  pub user_id:        Uuid,
  pub nickname:       String,
  pub bio:            Option<String>,
  pub age:            Option<u8>,
  pub gender:         Option<String>,
  pub profile_image:  Option<String>,
  pub last_active_at: Option<DateTime<Utc>>,
}

// ─── Age compatibility ───────────────────────────────────────────────────────

/// External age-compatibility function. Implementations return a value that
/// is nominally in `[0, 100]`; the ranker clamps it regardless.
pub trait AgeCompatibility: Send + Sync {
  fn score(&self, me: u8, other: u8) -> f64;
}

/// 100 for the same age, minus 10 per year apart, never below 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgeGapCompatibility;

impl AgeCompatibility for AgeGapCompatibility {
  fn score(&self, me: u8, other: u8) -> f64 {
    let gap = f64::from(me.abs_diff(other));
    (100.0 - gap * 10.0).max(0.0)
  }
}

// ─── Terms ───────────────────────────────────────────────────────────────────

/// Map a raw age-compatibility value onto the 0 – 25 term.
pub fn age_term(raw: f64) -> f64 {
  let raw = if raw.is_nan() { 0.0 } else { raw };
  raw.clamp(0.0, 100.0) / 100.0 * MAX_AGE_TERM
}

/// Discrete step function over time since last activity.
pub fn recency_term(last_active_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
  let Some(at) = last_active_at else {
    return 0.0;
  };
  let idle = now - at;
  if idle <= Duration::hours(1) {
    20.0
  } else if idle <= Duration::hours(6) {
    15.0
  } else if idle <= Duration::hours(24) {
    10.0
  } else if idle <= Duration::hours(72) {
    5.0
  } else {
    0.0
  }
}

/// +5 each for a profile image, a bio longer than 20 characters, and a
/// nickname longer than 2 characters.
pub fn completeness_term(profile: &UserProfile) -> f64 {
  let has_image = profile
    .profile_image
    .as_deref()
    .is_some_and(|s| !s.trim().is_empty());
  let has_bio = profile
    .bio
    .as_deref()
    .is_some_and(|b| b.chars().count() > 20);
  let has_nickname = profile.nickname.chars().count() > 2;

  [has_image, has_bio, has_nickname]
    .into_iter()
    .filter(|present| *present)
    .count() as f64
    * 5.0
}

/// Combine the terms into the final integer score in `[0, 100]`.
pub fn compatibility_score(
  age_raw: f64,
  recency: f64,
  completeness: f64,
  noise: f64,
) -> u8 {
  let total = BASE_SCORE + age_term(age_raw) + recency + completeness + noise;
  let total = if total.is_nan() { BASE_SCORE } else { total };
  total.clamp(0.0, 100.0).round() as u8
}

// ─── Anonymized output ───────────────────────────────────────────────────────

/// First character followed by one `*` per remaining character, with at
/// least one `*` so single-letter nicknames are not shown verbatim.
pub fn mask_nickname(nickname: &str) -> String {
  let mut chars = nickname.trim().chars();
  let Some(first) = chars.next() else {
    return String::new();
  };
  let hidden = chars.count().max(1);
  std::iter::once(first)
    .chain(std::iter::repeat_n('*', hidden))
    .collect()
}

/// A discovery candidate as returned to clients before any mutual like.
///
/// The only constructor is [`ScoredCandidate::anonymized`], so a candidate
/// can never carry a bio or a clear-text nickname.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredCandidate {
  pub user_id:       Uuid,
  pub nickname:      String,
  pub bio:           Option<String>,
  pub age:           Option<u8>,
  pub gender:        Option<String>,
  pub profile_image: Option<String>,
  pub score:         u8,
}

impl ScoredCandidate {
  pub fn anonymized(profile: UserProfile, score: u8) -> Self {
    Self {
      user_id: profile.user_id,
      nickname: mask_nickname(&profile.nickname),
      bio: None,
      age: profile.age,
      gender: profile.gender,
      profile_image: profile.profile_image,
      score,
    }
  }
}
