use std::time::Duration;

use proxima_core::{
  matches::AutoMatch,
  meetup::{FeatureSet, Features, NewParticipant},
  store::EngineStore,
};
use uuid::Uuid;

use super::{Harness, harness};
use crate::{EngineEvent, Error, events::ActivityKind};

fn upper(color: &str) -> Features {
  Features { upper_wear: Some(color.into()), ..Features::default() }
}

/// Wearing red, looking for white.
fn red_seeking_white() -> FeatureSet {
  FeatureSet {
    my_features: Features { lower_wear: Some("blue".into()), ..upper("red") },
    looking_for: upper("white"),
  }
}

/// Wearing white, looking for red.
fn white_seeking_red() -> FeatureSet {
  FeatureSet { my_features: upper("white"), looking_for: upper("red") }
}

async fn wait_for_matches(h: &Harness, participant_id: Uuid, n: usize) -> Vec<AutoMatch> {
  for _ in 0..200 {
    let found = h.engine.matcher.matches_for(participant_id).await.unwrap();
    if found.len() >= n {
      return found;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
  }
  panic!("participant {participant_id} never reached {n} auto-match(es)");
}

/// Insert a participant and profile directly, without triggering matching.
async fn seed(h: &Harness, meeting_id: Uuid, features: FeatureSet) -> Uuid {
  let p = h
    .store
    .add_participant(NewParticipant {
      user_id: Uuid::new_v4(),
      meeting_id,
      nickname: "guest".into(),
    })
    .await
    .unwrap();
  h.store.put_feature_profile(p.participant_id, features).await.unwrap();
  p.participant_id
}

#[tokio::test]
async fn mutual_descriptions_produce_one_auto_match() {
  let mut h = harness().await;
  let meeting = h.engine.matcher.create_meeting("Gangnam station".into()).await.unwrap();

  let p1 = h
    .engine
    .matcher
    .join(Uuid::new_v4(), meeting.meeting_id, "fox".into(), red_seeking_white())
    .await
    .unwrap();
  let p2 = h
    .engine
    .matcher
    .join(Uuid::new_v4(), meeting.meeting_id, "owl".into(), white_seeking_red())
    .await
    .unwrap();

  let found = wait_for_matches(&h, p1.participant_id, 1).await;
  assert_eq!(found.len(), 1);
  assert!(found[0].involves(p1.participant_id));
  assert!(found[0].involves(p2.participant_id));

  // Re-submitting the same features never duplicates the pair.
  let created = h
    .engine
    .matcher
    .update_features(p1.participant_id, red_seeking_white())
    .await
    .unwrap();
  assert_eq!(created, 0);
  let created = h
    .engine
    .matcher
    .update_features(p2.participant_id, white_seeking_red())
    .await
    .unwrap();
  assert_eq!(created, 0);
  assert_eq!(h.engine.matcher.matches_for(p2.participant_id).await.unwrap().len(), 1);

  // Let the background evaluations finish announcing.
  tokio::time::sleep(Duration::from_millis(50)).await;
  let announced = h
    .drain_events()
    .into_iter()
    .filter(|e| matches!(e, EngineEvent::NewMatch { .. }))
    .count();
  assert_eq!(announced, 1);
}

#[tokio::test]
async fn one_sided_interest_does_not_match() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();

  let p1 = seed(&h, meeting.meeting_id, red_seeking_white()).await;
  // Wears white but wants glasses, which p1 never declared.
  let p2 = seed(
    &h,
    meeting.meeting_id,
    FeatureSet {
      my_features: upper("white"),
      looking_for: Features { glasses: Some(true), ..Features::default() },
    },
  )
  .await;

  let run = h.engine.matcher.evaluate(p1).await.unwrap();
  assert_eq!(run.considered, 1);
  assert!(run.created.is_empty());
  assert!(h.engine.matcher.matches_for(p2).await.unwrap().is_empty());

  let attempts = h.store.match_attempts_for(p1).await.unwrap();
  assert_eq!(attempts.len(), 1);
  assert_eq!(attempts[0].meeting_id, meeting.meeting_id);
  assert_eq!(attempts[0].potential_matches, 1);
  assert_eq!(attempts[0].successful_matches, 0);
}

#[tokio::test]
async fn concurrent_evaluations_create_a_single_match() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let p1 = seed(&h, meeting.meeting_id, red_seeking_white()).await;
  let p2 = seed(&h, meeting.meeting_id, white_seeking_red()).await;

  let (a, b) = tokio::join!(h.engine.matcher.evaluate(p1), h.engine.matcher.evaluate(p2));
  let created = a.unwrap().created.len() + b.unwrap().created.len();

  assert_eq!(created, 1);
  assert_eq!(h.engine.matcher.matches_for(p1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn special_features_need_half_the_keywords() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();

  let seeker = seed(
    &h,
    meeting.meeting_id,
    FeatureSet {
      my_features: Features::default(),
      looking_for: Features {
        special_features: Some("black cap, red backpack".into()),
        ..Features::default()
      },
    },
  )
  .await;
  // Four sought keywords; two hits is enough.
  seed(
    &h,
    meeting.meeting_id,
    FeatureSet {
      my_features: Features {
        special_features: Some("wearing a black beanie and a red scarf".into()),
        ..Features::default()
      },
      looking_for: Features::default(),
    },
  )
  .await;
  // Only one hit.
  seed(
    &h,
    meeting.meeting_id,
    FeatureSet {
      my_features: Features {
        special_features: Some("green backpack".into()),
        ..Features::default()
      },
      looking_for: Features::default(),
    },
  )
  .await;

  let run = h.engine.matcher.evaluate(seeker).await.unwrap();
  assert_eq!(run.considered, 2);
  assert_eq!(run.created.len(), 1);

  let attempts = h.store.match_attempts_for(seeker).await.unwrap();
  assert_eq!(attempts.len(), 1);
  assert_eq!(attempts[0].potential_matches, 2);
  assert_eq!(attempts[0].successful_matches, 1);
}

#[tokio::test]
async fn participants_who_left_are_not_candidates() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let p1 = seed(&h, meeting.meeting_id, red_seeking_white()).await;
  let p2 = seed(&h, meeting.meeting_id, white_seeking_red()).await;

  let left = h.engine.matcher.leave(p2).await.unwrap();
  assert!(!left.is_active);
  assert!(left.left_at.is_some());

  let run = h.engine.matcher.evaluate(p1).await.unwrap();
  assert_eq!(run.considered, 0);

  // A participant who left cannot update features.
  let err = h
    .engine
    .matcher
    .update_features(p2, white_seeking_red())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ParticipantInactive(id) if id == p2));

  // Nor does evaluating them do anything.
  let run = h.engine.matcher.evaluate(p2).await.unwrap();
  assert_eq!(run.considered, 0);
  assert!(h.store.match_attempts_for(p2).await.unwrap().is_empty());
}

#[tokio::test]
async fn rejoining_reactivates_the_same_participant() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let user = Uuid::new_v4();

  let first = h
    .engine
    .matcher
    .join(user, meeting.meeting_id, "fox".into(), FeatureSet::default())
    .await
    .unwrap();
  h.engine.matcher.leave(first.participant_id).await.unwrap();

  let again = h
    .engine
    .matcher
    .join(user, meeting.meeting_id, "badger".into(), red_seeking_white())
    .await
    .unwrap();
  assert_eq!(again.participant_id, first.participant_id);
  assert!(again.is_active);
  assert_eq!(again.nickname, "badger");
  assert!(again.left_at.is_none());

  let profile = h.store.get_feature_profile(again.participant_id).await.unwrap().unwrap();
  assert_eq!(profile.looking_for, upper("white"));
}

#[tokio::test]
async fn joining_twice_while_active_refreshes_the_nickname() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let user = Uuid::new_v4();

  let first = h
    .engine
    .matcher
    .join(user, meeting.meeting_id, "fox".into(), FeatureSet::default())
    .await
    .unwrap();
  let again = h
    .engine
    .matcher
    .join(user, meeting.meeting_id, " badger ".into(), red_seeking_white())
    .await
    .unwrap();

  assert_eq!(again.participant_id, first.participant_id);
  assert!(again.is_active);
  assert_eq!(again.nickname, "badger");
  assert_eq!(again.joined_at, first.joined_at);

  let stored = h.store.get_participant(first.participant_id).await.unwrap().unwrap();
  assert_eq!(stored.nickname, "badger");
}

#[tokio::test]
async fn auto_match_logs_activity_for_both_participants() {
  let mut h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let p1 = seed(&h, meeting.meeting_id, red_seeking_white()).await;
  let p2 = seed(&h, meeting.meeting_id, white_seeking_red()).await;
  h.drain_events();

  let run = h.engine.matcher.evaluate(p1).await.unwrap();
  assert_eq!(run.created.len(), 1);

  let events = h.drain_events();
  assert!(matches!(events.first(), Some(EngineEvent::NewMatch { .. })));
  let mut matched: Vec<Uuid> = events
    .iter()
    .filter_map(|e| match e {
      EngineEvent::Activity(entry) if entry.kind == ActivityKind::AutoMatched => {
        entry.participant_id
      }
      _ => None,
    })
    .collect();
  matched.sort();
  let mut expected = vec![p1, p2];
  expected.sort();
  assert_eq!(matched, expected);
}

#[tokio::test]
async fn evaluate_without_a_profile_is_a_no_op() {
  let h = harness().await;
  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let p = h
    .store
    .add_participant(NewParticipant {
      user_id:    Uuid::new_v4(),
      meeting_id: meeting.meeting_id,
      nickname:   "quiet".into(),
    })
    .await
    .unwrap();

  let run = h.engine.matcher.evaluate(p.participant_id).await.unwrap();
  assert_eq!(run.considered, 0);
  assert!(run.created.is_empty());
  assert!(h.store.match_attempts_for(p.participant_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn join_validates_meeting_and_nickname() {
  let h = harness().await;
  let err = h
    .engine
    .matcher
    .join(Uuid::new_v4(), Uuid::new_v4(), "fox".into(), FeatureSet::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::MeetingNotFound(_)));

  let meeting = h.engine.matcher.create_meeting("m".into()).await.unwrap();
  let err = h
    .engine
    .matcher
    .join(Uuid::new_v4(), meeting.meeting_id, " ".into(), FeatureSet::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));

  assert!(matches!(
    h.engine.matcher.create_meeting("".into()).await,
    Err(Error::Validation(_))
  ));
}
