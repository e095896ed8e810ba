//! Feature Matcher: blind, bidirectional matching for instant meetups.
//!
//! Participant lifecycle:
//!
//! ```text
//! Joined → FeaturesSubmitted → (no match | AutoMatched) → Left
//!                 ↑__________________________|
//! ```
//!
//! Every feature submission triggers an evaluation against all other active
//! participants of the same meeting. An evaluation may run concurrently for
//! both sides of a pair; the store's atomic `create_auto_match_if_absent`
//! guarantees a single [`AutoMatch`] per unordered pair regardless.

use std::sync::Arc;

use proxima_core::{
  matches::{AutoMatch, NewAutoMatch, NewMatchAttempt},
  meetup::{FeatureSet, Meeting, NewParticipant, Participant, is_mutual},
  store::EngineStore,
};
use serde::Serialize;
use tracing::{Instrument as _, debug, info, info_span, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  events::{ActivityEntry, ActivityKind, EngineEvent, EventSink},
};

/// Summary of one evaluation run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Evaluation {
  /// Active candidates in the meeting that were compared.
  pub considered: usize,
  /// Auto-matches created by this run (excludes pre-existing ones).
  pub created:    Vec<AutoMatch>,
}

pub struct FeatureMatcher<S, E> {
  store:  Arc<S>,
  events: Arc<E>,
}

impl<S, E> Clone for FeatureMatcher<S, E> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), events: Arc::clone(&self.events) }
  }
}

impl<S, E> FeatureMatcher<S, E>
where
  S: EngineStore + 'static,
  E: EventSink + 'static,
{
  pub fn new(store: Arc<S>, events: Arc<E>) -> Self { Self { store, events } }

  // ── Meetings ──────────────────────────────────────────────────────────

  pub async fn create_meeting(&self, title: String) -> Result<Meeting> {
    let title = title.trim().to_owned();
    if title.is_empty() {
      return Err(Error::Validation("meeting title must not be empty".into()));
    }
    let meeting = self.store.add_meeting(title).await.map_err(Error::store)?;
    info!(meeting_id = %meeting.meeting_id, "meeting created");
    Ok(meeting)
  }

  async fn participant(&self, participant_id: Uuid) -> Result<Participant> {
    self
      .store
      .get_participant(participant_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ParticipantNotFound(participant_id))
  }

  // ── Join / leave ──────────────────────────────────────────────────────

  /// Join (or rejoin) a meeting with a feature submission.
  ///
  /// Matching runs in the background; this returns as soon as the
  /// participant and its profile are stored.
  pub async fn join(
    &self,
    user_id: Uuid,
    meeting_id: Uuid,
    nickname: String,
    features: FeatureSet,
  ) -> Result<Participant> {
    let nickname = nickname.trim().to_owned();
    if nickname.is_empty() {
      return Err(Error::Validation("nickname must not be empty".into()));
    }
    self
      .store
      .get_meeting(meeting_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MeetingNotFound(meeting_id))?;

    let existing = self
      .store
      .find_participant(user_id, meeting_id)
      .await
      .map_err(Error::store)?;

    let participant = match existing {
      Some(p) if !p.is_active => self
        .store
        .reactivate_participant(p.participant_id, nickname)
        .await
        .map_err(Error::store)?
        .ok_or(Error::ParticipantNotFound(p.participant_id))?,
      Some(p) => self
        .store
        .rename_participant(p.participant_id, nickname)
        .await
        .map_err(Error::store)?
        .ok_or(Error::ParticipantNotFound(p.participant_id))?,
      None => self
        .store
        .add_participant(NewParticipant { user_id, meeting_id, nickname })
        .await
        .map_err(Error::store)?,
    };

    self.store_features(&participant, features).await?;
    self.events.emit(EngineEvent::Activity(
      ActivityEntry::new(user_id, ActivityKind::JoinedMeeting, format!("joined {meeting_id}"))
        .for_participant(participant.participant_id),
    ));

    self.spawn_evaluation(participant.participant_id);
    Ok(participant)
  }

  /// Leave a meeting. Leaving twice is harmless.
  pub async fn leave(&self, participant_id: Uuid) -> Result<Participant> {
    let participant = self
      .store
      .deactivate_participant(participant_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ParticipantNotFound(participant_id))?;
    info!(%participant_id, "participant left");
    Ok(participant)
  }

  // ── Features ──────────────────────────────────────────────────────────

  /// Replace a participant's features and re-run matching for them.
  /// Returns the number of auto-matches this call created.
  pub async fn update_features(
    &self,
    participant_id: Uuid,
    features: FeatureSet,
  ) -> Result<usize> {
    let participant = self.participant(participant_id).await?;
    if !participant.is_active {
      return Err(Error::ParticipantInactive(participant_id));
    }
    self.store_features(&participant, features).await?;
    Ok(self.evaluate(participant_id).await?.created.len())
  }

  async fn store_features(&self, participant: &Participant, features: FeatureSet) -> Result<()> {
    self
      .store
      .put_feature_profile(participant.participant_id, features)
      .await
      .map_err(Error::store)?;
    self.events.emit(EngineEvent::FeatureUpdated {
      meeting_id:     participant.meeting_id,
      participant_id: participant.participant_id,
    });
    Ok(())
  }

  pub async fn matches_for(&self, participant_id: Uuid) -> Result<Vec<AutoMatch>> {
    self.participant(participant_id).await?;
    self
      .store
      .auto_matches_for(participant_id)
      .await
      .map_err(Error::store)
  }

  // ── Evaluation ────────────────────────────────────────────────────────

  fn spawn_evaluation(&self, participant_id: Uuid) {
    let matcher = self.clone();
    let span = info_span!("evaluate", %participant_id);
    tokio::spawn(
      async move {
        if let Err(e) = matcher.evaluate(participant_id).await {
          warn!(error = %e, "background match evaluation failed");
        }
      }
      .instrument(span),
    );
  }

  /// Compare one participant against every other active participant of the
  /// same meeting and record any new mutual matches.
  ///
  /// A participant without a feature profile, or one that has left, is a
  /// no-op and records no attempt.
  pub async fn evaluate(&self, participant_id: Uuid) -> Result<Evaluation> {
    let Some(me) = self
      .store
      .get_feature_profile(participant_id)
      .await
      .map_err(Error::store)?
    else {
      debug!(%participant_id, "no feature profile; nothing to evaluate");
      return Ok(Evaluation::default());
    };

    let participant = self.participant(participant_id).await?;
    if !participant.is_active {
      debug!(%participant_id, "participant has left; nothing to evaluate");
      return Ok(Evaluation::default());
    }
    let meeting_id = participant.meeting_id;

    let candidates: Vec<_> = self
      .store
      .active_profiles(meeting_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .filter(|other| other.participant_id != participant_id)
      .collect();

    let mut created = Vec::new();
    for other in candidates.iter().filter(|other| is_mutual(&me, other)) {
      let fresh = self
        .store
        .create_auto_match_if_absent(NewAutoMatch {
          meeting_id,
          participant1_id: participant_id,
          participant2_id: other.participant_id,
          chat_room_id: Uuid::new_v4(),
        })
        .await
        .map_err(Error::store)?;
      if let Some(m) = fresh {
        created.push(m);
      }
    }

    self
      .store
      .record_match_attempt(NewMatchAttempt {
        meeting_id,
        participant_id,
        potential_matches: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
        successful_matches: u32::try_from(created.len()).unwrap_or(u32::MAX),
      })
      .await
      .map_err(Error::store)?;

    debug!(
      %participant_id,
      considered = candidates.len(),
      created = created.len(),
      "evaluation finished"
    );

    for m in &created {
      self.announce(&participant, m).await;
    }

    Ok(Evaluation { considered: candidates.len(), created })
  }

  /// Never fails: a counterpart that cannot be loaded only drops the
  /// activity entries.
  async fn announce(&self, me: &Participant, m: &AutoMatch) {
    let other_id = if m.participant1_id == me.participant_id {
      m.participant2_id
    } else {
      m.participant1_id
    };

    info!(
      meeting_id = %m.meeting_id,
      participant1 = %m.participant1_id,
      participant2 = %m.participant2_id,
      "auto-match created"
    );
    self.events.emit(EngineEvent::NewMatch {
      meeting_id:   m.meeting_id,
      participant1: m.participant1_id,
      participant2: m.participant2_id,
      chat_room_id: m.chat_room_id,
    });

    let other = match self.participant(other_id).await {
      Ok(other) => other,
      Err(e) => {
        warn!(participant_id = %other_id, error = %e, "skipping auto-match activity");
        return;
      }
    };
    for (p, counterpart) in [(me, &other), (&other, me)] {
      self.events.emit(EngineEvent::Activity(
        ActivityEntry::new(
          p.user_id,
          ActivityKind::AutoMatched,
          format!("matched with {}", counterpart.nickname),
        )
        .for_participant(p.participant_id),
      ));
    }
  }
}
