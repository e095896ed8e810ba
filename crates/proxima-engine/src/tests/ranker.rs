use chrono::{Duration, Utc};
use proxima_core::{ranking::UserProfile, store::EngineStore, target::NewTarget};
use uuid::Uuid;

use super::{Harness, harness, harness_with, seoul_city_hall};
use crate::{EngineConfig, Error};

fn user(nickname: &str, age: Option<u8>) -> UserProfile {
  UserProfile {
    user_id: Uuid::new_v4(),
    nickname: nickname.into(),
    bio: None,
    age,
    gender: Some("female".into()),
    profile_image: None,
    last_active_at: None,
  }
}

async fn group(h: &Harness) -> Uuid {
  h.store
    .add_target(NewTarget {
      owner_id:      Uuid::new_v4(),
      name:          "Hongdae".into(),
      center:        seoul_city_hall(),
      radius_meters: 200.0,
    })
    .await
    .unwrap()
    .target_id
}

async fn enrol(h: &Harness, group_id: Uuid, profile: UserProfile) -> Uuid {
  let id = profile.user_id;
  h.store.upsert_user(profile).await.unwrap();
  h.store.grant_membership(id, group_id).await.unwrap();
  id
}

#[tokio::test]
async fn non_members_cannot_browse() {
  let h = harness().await;
  let g = group(&h).await;
  let err = h.engine.ranker.recommend(Uuid::new_v4(), g, 10).await.unwrap_err();
  assert!(matches!(err, Error::NotAMember { .. }));
}

#[tokio::test]
async fn candidates_are_ranked_and_anonymized() {
  let h = harness().await;
  let g = group(&h).await;
  let me = enrol(&h, g, user("me", Some(30))).await;

  let star = enrol(&h, g, UserProfile {
    bio: Some("likes long walks by the Han river".into()),
    profile_image: Some("https://cdn.example/jiwoo.jpg".into()),
    last_active_at: Some(Utc::now()),
    ..user("Jiwoo", Some(30))
  })
  .await;
  let quiet = enrol(&h, g, UserProfile {
    last_active_at: Some(Utc::now() - Duration::days(10)),
    ..user("Bora", Some(40))
  })
  .await;
  // Missing age: never a candidate.
  enrol(&h, g, user("Ghost", None)).await;

  let ranked = h.engine.ranker.recommend(me, g, 10).await.unwrap();
  let ids: Vec<_> = ranked.iter().map(|c| c.user_id).collect();
  assert_eq!(ids, vec![star, quiet]);

  // 50 + 25 + 20 + 15, clamped.
  assert_eq!(ranked[0].score, 100);
  // 50 + 0 + 0 + 5 (nickname only).
  assert_eq!(ranked[1].score, 55);

  assert_eq!(ranked[0].nickname, "J****");
  assert!(ranked.iter().all(|c| c.bio.is_none()));
  assert_eq!(ranked[0].profile_image.as_deref(), Some("https://cdn.example/jiwoo.jpg"));
}

#[tokio::test]
async fn liked_users_and_self_are_excluded() {
  let h = harness().await;
  let g = group(&h).await;
  let me = enrol(&h, g, user("me", Some(30))).await;
  let liked = enrol(&h, g, user("Liked", Some(30))).await;
  let fresh = enrol(&h, g, user("Fresh", Some(31))).await;

  h.engine.ledger.record_like(me, liked, Some(g)).await.unwrap();

  let ranked = h.engine.ranker.recommend(me, g, 10).await.unwrap();
  let ids: Vec<_> = ranked.iter().map(|c| c.user_id).collect();
  assert_eq!(ids, vec![fresh]);
}

#[tokio::test]
async fn count_limits_the_result() {
  let h = harness().await;
  let g = group(&h).await;
  let me = enrol(&h, g, user("me", Some(30))).await;
  for i in 0..5 {
    enrol(&h, g, user(&format!("user{i}"), Some(25 + i))).await;
  }

  assert_eq!(h.engine.ranker.recommend(me, g, 3).await.unwrap().len(), 3);
  assert!(h.engine.ranker.recommend(me, g, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn member_without_a_profile_is_not_found() {
  let h = harness().await;
  let g = group(&h).await;
  let ghost = Uuid::new_v4();
  h.store.grant_membership(ghost, g).await.unwrap();

  let err = h.engine.ranker.recommend(ghost, g, 5).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(id) if id == ghost));
}

#[tokio::test]
async fn noisy_scores_stay_in_range() {
  let h = harness_with(EngineConfig { exploration_noise: 10.0, ..EngineConfig::default() }).await;
  let g = group(&h).await;
  let me = enrol(&h, g, user("me", Some(30))).await;
  enrol(&h, g, user("Bora", Some(30))).await;

  for _ in 0..20 {
    let ranked = h.engine.ranker.recommend(me, g, 1).await.unwrap();
    // 50 + 25 + 0 + 5 plus noise in [0, 10).
    assert!((80..=90).contains(&ranked[0].score), "score {}", ranked[0].score);
  }
}

#[tokio::test]
async fn score_is_clamped_with_extreme_noise() {
  let h = harness().await;
  let me = user("me", Some(30));
  let other = user("other", Some(30));
  let now = Utc::now();

  assert_eq!(h.engine.ranker.score(&me, &other, now, 1_000.0), 100);
  assert_eq!(h.engine.ranker.score(&me, &other, now, -1_000.0), 0);
}
