use std::time::Duration;

use proxima_core::matches::MatchStatus;
use uuid::Uuid;

use super::harness;
use crate::{EngineEvent, Error};

#[tokio::test]
async fn create_match_if_absent_is_idempotent() {
  let mut h = harness().await;
  let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

  let first = h.engine.ledger.create_match_if_absent(a, b, None).await.unwrap();
  let second = h.engine.ledger.create_match_if_absent(b, a, None).await.unwrap();

  assert_eq!(first.match_id, second.match_id);
  assert_eq!(first.status, MatchStatus::Active);

  let created = h
    .drain_events()
    .into_iter()
    .filter(|e| matches!(e, EngineEvent::MatchCreated { .. }))
    .count();
  assert_eq!(created, 1);
}

#[tokio::test]
async fn matching_with_yourself_is_rejected() {
  let h = harness().await;
  let a = Uuid::new_v4();
  assert!(matches!(
    h.engine.ledger.create_match_if_absent(a, a, None).await,
    Err(Error::Validation(_))
  ));
  assert!(matches!(
    h.engine.ledger.record_like(a, a, None).await,
    Err(Error::Validation(_))
  ));
}

#[tokio::test]
async fn mutual_like_creates_a_match() {
  let h = harness().await;
  let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
  let group = Some(Uuid::new_v4());

  assert!(h.engine.ledger.record_like(a, b, group).await.unwrap().is_none());
  let m = h.engine.ledger.record_like(b, a, group).await.unwrap().expect("match");

  assert_eq!(m.group_id, group);
  assert!(m.involves(a) && m.involves(b));

  // Liking again returns the same match.
  let again = h.engine.ledger.record_like(a, b, group).await.unwrap().expect("match");
  assert_eq!(again.match_id, m.match_id);
}

#[tokio::test]
async fn status_only_moves_forward() {
  let h = harness().await;
  let ledger = &h.engine.ledger;
  let m = ledger
    .create_match_if_absent(Uuid::new_v4(), Uuid::new_v4(), None)
    .await
    .unwrap();

  let same = ledger.transition(m.match_id, MatchStatus::Active).await.unwrap();
  assert_eq!(same.status, MatchStatus::Active);

  let expired = ledger.transition(m.match_id, MatchStatus::Expired).await.unwrap();
  assert_eq!(expired.status, MatchStatus::Expired);

  let err = ledger.transition(m.match_id, MatchStatus::Active).await.unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidTransition { from: MatchStatus::Expired, to: MatchStatus::Active }
  ));

  let deleted = ledger.transition(m.match_id, MatchStatus::Deleted).await.unwrap();
  assert_eq!(deleted.status, MatchStatus::Deleted);

  let err = ledger.transition(m.match_id, MatchStatus::Expired).await.unwrap_err();
  assert!(matches!(err, Error::InvalidTransition { .. }));

  let err = ledger.transition(Uuid::new_v4(), MatchStatus::Expired).await.unwrap_err();
  assert!(matches!(err, Error::MatchNotFound(_)));
}

#[tokio::test]
async fn expiry_skips_matches_with_messages() {
  let h = harness().await;
  let ledger = &h.engine.ledger;
  let quiet = ledger
    .create_match_if_absent(Uuid::new_v4(), Uuid::new_v4(), None)
    .await
    .unwrap();
  let chatty = ledger
    .create_match_if_absent(Uuid::new_v4(), Uuid::new_v4(), None)
    .await
    .unwrap();
  let counted = ledger.record_message(chatty.match_id).await.unwrap();
  assert_eq!(counted.message_count, 1);

  // Nothing is a week old yet.
  assert_eq!(ledger.expire_inactive_matches(7, true).await.unwrap(), 0);

  tokio::time::sleep(Duration::from_millis(5)).await;
  assert_eq!(ledger.expire_inactive_matches(0, true).await.unwrap(), 1);
  assert_eq!(ledger.get_match(quiet.match_id).await.unwrap().status, MatchStatus::Expired);
  assert_eq!(ledger.get_match(chatty.match_id).await.unwrap().status, MatchStatus::Active);

  assert_eq!(ledger.expire_inactive_matches(0, false).await.unwrap(), 1);
  assert_eq!(ledger.get_match(chatty.match_id).await.unwrap().status, MatchStatus::Expired);
}

#[tokio::test]
async fn expiry_cutoff_before_the_calendar_is_rejected() {
  let h = harness().await;
  let ledger = &h.engine.ledger;
  let m = ledger
    .create_match_if_absent(Uuid::new_v4(), Uuid::new_v4(), None)
    .await
    .unwrap();

  let err = ledger.expire_inactive_matches(u32::MAX, true).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  assert_eq!(ledger.get_match(m.match_id).await.unwrap().status, MatchStatus::Active);
}

#[tokio::test]
async fn record_message_on_unknown_match_is_not_found() {
  let h = harness().await;
  let err = h.engine.ledger.record_message(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::MatchNotFound(_)));
}

#[tokio::test]
async fn mutual_connections_are_symmetric() {
  let h = harness().await;
  let ledger = &h.engine.ledger;
  let [a, b, c, d, e] = [(); 5].map(|_| Uuid::new_v4());

  let ab = ledger.create_match_if_absent(a, b, None).await.unwrap();
  ledger.create_match_if_absent(a, c, None).await.unwrap();
  ledger.create_match_if_absent(c, b, None).await.unwrap();
  ledger.create_match_if_absent(a, d, None).await.unwrap();
  let be = ledger.create_match_if_absent(b, e, None).await.unwrap();
  ledger.create_match_if_absent(a, e, None).await.unwrap();

  let mut from_a = ledger.mutual_connections(ab.match_id, a).await.unwrap();
  let mut from_b = ledger.mutual_connections(ab.match_id, b).await.unwrap();
  from_a.sort();
  from_b.sort();
  let mut expected = vec![c, e];
  expected.sort();
  assert_eq!(from_a, expected);
  assert_eq!(from_b, expected);

  // Deleted matches no longer count.
  ledger.transition(be.match_id, MatchStatus::Deleted).await.unwrap();
  assert_eq!(ledger.mutual_connections(ab.match_id, a).await.unwrap(), vec![c]);

  let err = ledger.mutual_connections(ab.match_id, d).await.unwrap_err();
  assert!(matches!(err, Error::NotAParty { user_id, .. } if user_id == d));
}
