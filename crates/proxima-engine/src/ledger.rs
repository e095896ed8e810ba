//! Match Ledger: idempotent match creation, forward-only lifecycle and
//! mutual-connection queries.

use std::{collections::BTreeSet, sync::Arc};

use chrono::{Duration, Utc};
use proxima_core::{
  matches::{Match, MatchCreation, MatchStatus, NewMatch},
  store::{EngineStore, UserDirectory},
};
use tracing::info;
use uuid::Uuid;

use crate::{
  Error, Result,
  events::{ActivityEntry, ActivityKind, EngineEvent, EventSink},
};

pub struct MatchLedger<S, D, E> {
  store:     Arc<S>,
  directory: Arc<D>,
  events:    Arc<E>,
}

impl<S, D, E> MatchLedger<S, D, E>
where
  S: EngineStore,
  D: UserDirectory,
  E: EventSink,
{
  pub fn new(store: Arc<S>, directory: Arc<D>, events: Arc<E>) -> Self {
    Self { store, directory, events }
  }

  /// Return the live match for the unordered pair in `group_id`, creating an
  /// `Active` one if none exists. Calling this twice yields the same match.
  pub async fn create_match_if_absent(
    &self,
    user_a: Uuid,
    user_b: Uuid,
    group_id: Option<Uuid>,
  ) -> Result<Match> {
    if user_a == user_b {
      return Err(Error::Validation("a user cannot match with themselves".into()));
    }

    let creation = self
      .store
      .create_match_if_absent(NewMatch { user_a, user_b, group_id })
      .await
      .map_err(Error::store)?;

    if let MatchCreation::Created(m) = &creation {
      info!(match_id = %m.match_id, "match created");
      self.events.emit(EngineEvent::MatchCreated {
        match_id: m.match_id,
        user1:    m.user1_id,
        user2:    m.user2_id,
      });
      for (user, other) in [(m.user1_id, m.user2_id), (m.user2_id, m.user1_id)] {
        self.events.emit(EngineEvent::Activity(ActivityEntry::new(
          user,
          ActivityKind::Matched,
          format!("matched with {other}"),
        )));
      }
    }

    Ok(creation.into_match())
  }

  /// Record that `from` likes `to`. A like that completes a mutual pair
  /// creates (or returns) the match.
  pub async fn record_like(
    &self,
    from: Uuid,
    to: Uuid,
    group_id: Option<Uuid>,
  ) -> Result<Option<Match>> {
    if from == to {
      return Err(Error::Validation("a user cannot like themselves".into()));
    }
    self.directory.record_like(from, to).await.map_err(Error::directory)?;
    self.events.emit(EngineEvent::Activity(ActivityEntry::new(
      from,
      ActivityKind::Liked,
      format!("liked {to}"),
    )));

    let mutual = self.directory.has_liked(to, from).await.map_err(Error::directory)?;
    if !mutual {
      return Ok(None);
    }
    self.create_match_if_absent(from, to, group_id).await.map(Some)
  }

  pub async fn get_match(&self, match_id: Uuid) -> Result<Match> {
    self
      .store
      .get_match(match_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MatchNotFound(match_id))
  }

  /// Move a match forward through its lifecycle.
  pub async fn transition(&self, match_id: Uuid, to: MatchStatus) -> Result<Match> {
    let current = self.get_match(match_id).await?;
    current.status.check_transition(to)?;
    if current.status == to {
      return Ok(current);
    }

    let updated = self
      .store
      .set_match_status(match_id, to)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MatchNotFound(match_id))?;

    // Lost a race against a further-forward transition.
    if updated.status != to {
      return Err(Error::InvalidTransition { from: updated.status, to });
    }
    info!(%match_id, status = %to, "match status changed");
    Ok(updated)
  }

  /// Count a message exchanged inside the match.
  pub async fn record_message(&self, match_id: Uuid) -> Result<Match> {
    self
      .store
      .record_match_message(match_id, Utc::now())
      .await
      .map_err(Error::store)?
      .ok_or(Error::MatchNotFound(match_id))
  }

  /// Expire `Active` matches older than `older_than_days`; with
  /// `require_no_messages`, only those in which nobody has written.
  pub async fn expire_inactive_matches(
    &self,
    older_than_days: u32,
    require_no_messages: bool,
  ) -> Result<usize> {
    let cutoff = Duration::try_days(i64::from(older_than_days))
      .and_then(|age| Utc::now().checked_sub_signed(age))
      .ok_or_else(|| {
        Error::Validation(format!("older_than_days out of range: {older_than_days}"))
      })?;
    let expired = self
      .store
      .expire_matches(cutoff, require_no_messages)
      .await
      .map_err(Error::store)?;
    info!(expired, older_than_days, require_no_messages, "inactive matches expired");
    Ok(expired)
  }

  async fn partners(&self, user_id: Uuid) -> Result<BTreeSet<Uuid>> {
    Ok(
      self
        .store
        .matches_for_user(user_id)
        .await
        .map_err(Error::store)?
        .iter()
        .filter_map(|m| m.counterpart(user_id))
        .collect(),
    )
  }

  /// Users that both parties of `match_id` have independently matched with.
  /// `user_id` must be one of the two parties.
  pub async fn mutual_connections(&self, match_id: Uuid, user_id: Uuid) -> Result<Vec<Uuid>> {
    let m = self.get_match(match_id).await?;
    let other = m
      .counterpart(user_id)
      .ok_or(Error::NotAParty { user_id, match_id })?;

    let mine = self.partners(user_id).await?;
    let theirs = self.partners(other).await?;

    Ok(
      mine
        .intersection(&theirs)
        .copied()
        .filter(|u| *u != user_id && *u != other)
        .collect(),
    )
  }
}
