//! Compatibility Ranker: scored, anonymized discovery inside a group.

use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, Utc};
use proxima_core::{
  ranking::{
    AgeCompatibility, ScoredCandidate, UserProfile, compatibility_score,
    completeness_term, recency_term,
  },
  store::{EngineStore, UserDirectory},
};
use rand::Rng;
use tracing::debug;
use uuid::Uuid;

use crate::{Error, Result};

pub struct CompatibilityRanker<S, D> {
  store:     Arc<S>,
  directory: Arc<D>,
  age:       Arc<dyn AgeCompatibility>,
  max_noise: f64,
}

impl<S, D> CompatibilityRanker<S, D>
where
  S: EngineStore,
  D: UserDirectory,
{
  /// `max_noise` is the upper bound of the uniform exploration term; `0`
  /// makes rankings deterministic.
  pub fn new(
    store: Arc<S>,
    directory: Arc<D>,
    age: Arc<dyn AgeCompatibility>,
    max_noise: f64,
  ) -> Self {
    let max_noise = if max_noise.is_finite() { max_noise.max(0.0) } else { 0.0 };
    Self { store, directory, age, max_noise }
  }

  /// Up to `count` anonymized candidates from `group_id` for `user_id`,
  /// best first.
  pub async fn recommend(
    &self,
    user_id: Uuid,
    group_id: Uuid,
    count: usize,
  ) -> Result<Vec<ScoredCandidate>> {
    let member = self
      .store
      .is_active_member(user_id, group_id)
      .await
      .map_err(Error::store)?;
    if !member {
      return Err(Error::NotAMember { user_id, group_id });
    }
    if count == 0 {
      return Ok(Vec::new());
    }

    let me = self
      .directory
      .get_profile(user_id)
      .await
      .map_err(Error::directory)?
      .ok_or(Error::UserNotFound(user_id))?;

    let mut excluded: HashSet<Uuid> = self
      .directory
      .liked_user_ids(user_id)
      .await
      .map_err(Error::directory)?
      .into_iter()
      .collect();
    excluded.insert(user_id);

    let pool = self
      .directory
      .group_candidates(group_id, excluded.iter().copied().collect(), count.saturating_mul(2))
      .await
      .map_err(Error::directory)?;

    // The directory is a collaborator; re-apply the exclusion rules here.
    let pool: Vec<UserProfile> = pool
      .into_iter()
      .filter(|c| !excluded.contains(&c.user_id))
      .filter(|c| c.age.is_some() && c.gender.is_some())
      .collect();

    let mut scored = self.score_all(&me, pool, Utc::now());
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(count);

    debug!(%user_id, %group_id, returned = scored.len(), "recommendations ranked");

    Ok(
      scored
        .into_iter()
        .map(|(profile, score)| ScoredCandidate::anonymized(profile, score))
        .collect(),
    )
  }

  fn score_all(
    &self,
    me: &UserProfile,
    pool: Vec<UserProfile>,
    now: DateTime<Utc>,
  ) -> Vec<(UserProfile, u8)> {
    let mut rng = rand::thread_rng();
    pool
      .into_iter()
      .map(|candidate| {
        let noise = if self.max_noise > 0.0 {
          rng.gen_range(0.0..self.max_noise)
        } else {
          0.0
        };
        let score = self.score(me, &candidate, now, noise);
        (candidate, score)
      })
      .collect()
  }

  /// The compatibility of `candidate` for `me`, with the given noise.
  pub fn score(
    &self,
    me: &UserProfile,
    candidate: &UserProfile,
    now: DateTime<Utc>,
    noise: f64,
  ) -> u8 {
    let age_raw = match (me.age, candidate.age) {
      (Some(a), Some(b)) => self.age.score(a, b),
      _ => 0.0,
    };
    compatibility_score(
      age_raw,
      recency_term(candidate.last_active_at, now),
      completeness_term(candidate),
      noise,
    )
  }
}
