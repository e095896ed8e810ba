//! Instant meetups: meetings, participants and the self-description /
//! sought-description pairs that drive blind matching.
//!
//! Matching is bidirectional. A participant `a` matches `b` only when `b`'s
//! self-description satisfies what `a` is looking for **and** `a`'s
//! self-description satisfies what `b` is looking for. See [`is_mutual`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Meeting & participants ──────────────────────────────────────────────────

/// An instant meetup that participants join anonymously.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meeting {
  pub meeting_id: Uuid,
  pub title:      String,
  pub created_at: DateTime<Utc>,
}

/// A user's presence in a meeting. There is at most one row per
/// `(user_id, meeting_id)`; leaving flips `is_active`, rejoining flips it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
  pub participant_id: Uuid,
  pub user_id:        Uuid,
  pub meeting_id:     Uuid,
  pub nickname:       String,
  pub is_active:      bool,
  pub joined_at:      DateTime<Utc>,
  pub left_at:        Option<DateTime<Utc>>,
}

/// Input to [`crate::store::EngineStore::add_participant`].
#[derive(Debug, Clone)]
pub struct NewParticipant {
  pub user_id:    Uuid,
  pub meeting_id: Uuid,
  pub nickname:   String,
}

// ─── Features ────────────────────────────────────────────────────────────────

/// A structured, anonymous description of what someone looks like today.
///
/// Every field is optional. On the "looking for" side an absent field is a
/// wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub upper_wear:       Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lower_wear:       Option<String>,
  /// `None` means unknown (self side) or "don't care" (sought side).
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub glasses:          Option<bool>,
  /// Free text such as "black cap, red backpack".
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub special_features: Option<String>,
}

/// Both halves of a participant's submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
  #[serde(default)]
  pub my_features: Features,
  #[serde(default)]
  pub looking_for: Features,
}

/// The stored feature submission of one participant (one-to-one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureProfile {
  pub participant_id: Uuid,
  pub my_features:    Features,
  pub looking_for:    Features,
  pub updated_at:     DateTime<Utc>,
}

// ─── Satisfaction rules ──────────────────────────────────────────────────────

/// Fraction of sought keywords that must be found in the other side's
/// special features. Rounded up, so 1 of 1, 1 of 2, 2 of 3, 2 of 4 …
pub const KEYWORD_MATCH_RATIO: f64 = 0.5;

/// Split free text into lowercase keywords: any non-alphanumeric character is
/// a separator, and single-character fragments are dropped.
pub fn keywords(text: &str) -> Vec<String> {
  text
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| t.chars().count() > 1)
    .map(str::to_owned)
    .collect()
}

/// Minimum number of sought keywords that must be present.
pub fn required_keyword_hits(wanted: usize) -> usize {
  (wanted as f64 * KEYWORD_MATCH_RATIO).ceil() as usize
}

fn wear_satisfied(want: Option<&str>, have: Option<&str>) -> bool {
  match want.map(str::trim).filter(|w| !w.is_empty()) {
    None => true,
    Some(w) => have.map(str::trim) == Some(w),
  }
}

fn special_features_satisfied(want: Option<&str>, have: Option<&str>) -> bool {
  let wanted = keywords(want.unwrap_or_default());
  if wanted.is_empty() {
    return true;
  }
  let offered = keywords(have.unwrap_or_default());

  let hits = wanted
    .iter()
    .filter(|w| {
      offered
        .iter()
        .any(|h| h.contains(w.as_str()) || w.contains(h.as_str()))
    })
    .count();

  hits >= required_keyword_hits(wanted.len())
}

/// Does `have` satisfy the description `want`?
pub fn satisfies(want: &Features, have: &Features) -> bool {
  wear_satisfied(want.upper_wear.as_deref(), have.upper_wear.as_deref())
    && wear_satisfied(want.lower_wear.as_deref(), have.lower_wear.as_deref())
    && want.glasses.is_none_or(|g| have.glasses == Some(g))
    && special_features_satisfied(
      want.special_features.as_deref(),
      have.special_features.as_deref(),
    )
}

/// Bidirectional check: each side's self-description satisfies what the
/// other is looking for.
pub fn is_mutual(a: &FeatureProfile, b: &FeatureProfile) -> bool {
  satisfies(&a.looking_for, &b.my_features)
    && satisfies(&b.looking_for, &a.my_features)
}
