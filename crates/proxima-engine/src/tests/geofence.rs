use chrono::{Duration, Utc};
use proxima_core::{
  geo::{Coordinate, OperatingRegion, distance_meters},
  store::EngineStore,
  target::CheckInMethod,
};
use proxima_qr::QR_TTL_MS;
use uuid::Uuid;

use super::{harness, harness_with, north_of, seoul_city_hall};
use crate::{CheckInOutcome, EngineConfig, EngineEvent, Error};

async fn city_hall(h: &super::Harness, radius: f64) -> Uuid {
  h.engine
    .geofence
    .register_target(Uuid::new_v4(), "City Hall".into(), seoul_city_hall(), radius)
    .await
    .unwrap()
    .target_id
}

// ─── GPS ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn gps_inside_radius_admits_and_grants_membership() {
  let mut h = harness().await;
  let target = city_hall(&h, 100.0).await;
  let user = Uuid::new_v4();

  let outcome = h
    .engine
    .geofence
    .verify_gps(user, target, north_of(seoul_city_hall(), 80.0), Some(10.0))
    .await
    .unwrap();

  let CheckInOutcome::Admitted { check_in, membership } = outcome else {
    panic!("expected a fresh admission");
  };
  assert_eq!(check_in.method, CheckInMethod::Gps);
  assert!(check_in.is_valid);
  assert_eq!(check_in.accuracy_meters, Some(10.0));
  assert!(check_in.address.as_deref().is_some_and(|a| a.starts_with("lat ")));
  assert!(membership.is_active);
  assert!(h.store.is_active_member(user, target).await.unwrap());

  let events = h.drain_events();
  assert!(events.iter().any(|e| matches!(
    e,
    EngineEvent::CheckedIn { method: CheckInMethod::Gps, .. }
  )));
}

#[tokio::test]
async fn gps_outside_radius_reports_shortfall_and_writes_nothing() {
  let h = harness().await;
  let target = city_hall(&h, 100.0).await;
  let user = Uuid::new_v4();

  let err = h
    .engine
    .geofence
    .verify_gps(user, target, north_of(seoul_city_hall(), 150.0), None)
    .await
    .unwrap_err();

  match err {
    Error::OutOfRange { distance_meters, radius_meters, shortfall_meters, bearing_degrees } => {
      assert!((distance_meters - 150.0).abs() < 0.01, "distance {distance_meters}");
      assert_eq!(radius_meters, 100.0);
      assert!((shortfall_meters - 50.0).abs() < 0.01, "shortfall {shortfall_meters}");
      // The center lies due south of the claim.
      assert!((bearing_degrees - 180.0).abs() < 0.01, "bearing {bearing_degrees}");
    }
    other => panic!("expected OutOfRange, got {other:?}"),
  }

  assert!(h.engine.geofence.check_ins(target, 10).await.unwrap().is_empty());
  assert!(!h.store.is_active_member(user, target).await.unwrap());
}

#[tokio::test]
async fn claim_exactly_on_the_boundary_is_inside() {
  let h = harness().await;
  let claim = north_of(seoul_city_hall(), 120.0);
  let radius = distance_meters(claim, seoul_city_hall());
  let target = city_hall(&h, radius).await;

  let outcome = h
    .engine
    .geofence
    .verify_gps(Uuid::new_v4(), target, claim, None)
    .await
    .unwrap();
  assert!(!outcome.is_already_member());
}

#[tokio::test]
async fn repeat_check_in_is_logged_but_reports_already_member() {
  let h = harness().await;
  let target = city_hall(&h, 100.0).await;
  let user = Uuid::new_v4();
  let claim = north_of(seoul_city_hall(), 10.0);

  h.engine.geofence.verify_gps(user, target, claim, None).await.unwrap();
  let second = h.engine.geofence.verify_gps(user, target, claim, None).await.unwrap();

  assert!(second.is_already_member());
  assert_eq!(h.engine.geofence.check_ins(target, 10).await.unwrap().len(), 2);
  assert_eq!(h.engine.geofence.location_history(user, 10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_coordinates_are_rejected() {
  let h = harness().await;
  let target = city_hall(&h, 100.0).await;

  for bad in [Coordinate::new(91.0, 0.0), Coordinate::new(0.0, -181.0), Coordinate::new(f64::NAN, 0.0)] {
    let err = h
      .engine
      .geofence
      .verify_gps(Uuid::new_v4(), target, bad, None)
      .await
      .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{bad:?} gave {err:?}");
  }

  let err = h
    .engine
    .geofence
    .verify_gps(Uuid::new_v4(), target, seoul_city_hall(), Some(-1.0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn unknown_target_is_not_found() {
  let h = harness().await;
  let missing = Uuid::new_v4();
  let err = h
    .engine
    .geofence
    .verify_gps(Uuid::new_v4(), missing, seoul_city_hall(), None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::TargetNotFound(id) if id == missing));
}

#[tokio::test]
async fn operating_region_rejects_fixes_outside_it() {
  let korea = OperatingRegion {
    min_latitude:  33.0,
    max_latitude:  39.0,
    min_longitude: 124.0,
    max_longitude: 132.0,
  };
  let h = harness_with(EngineConfig { operating_region: Some(korea), exploration_noise: 0.0 }).await;
  let target = city_hall(&h, 100.0).await;

  let err = h
    .engine
    .geofence
    .verify_gps(Uuid::new_v4(), target, Coordinate::ORIGIN, None)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

// ─── Target management ───────────────────────────────────────────────────────

#[tokio::test]
async fn register_target_validates_input() {
  let h = harness().await;
  let geofence = &h.engine.geofence;
  let owner = Uuid::new_v4();

  assert!(matches!(
    geofence.register_target(owner, "  ".into(), seoul_city_hall(), 50.0).await,
    Err(Error::Validation(_))
  ));
  assert!(matches!(
    geofence.register_target(owner, "x".into(), seoul_city_hall(), 0.0).await,
    Err(Error::Validation(_))
  ));
}

#[tokio::test]
async fn only_the_owner_may_move_a_geofence() {
  let h = harness().await;
  let owner = Uuid::new_v4();
  let target = h
    .engine
    .geofence
    .register_target(owner, "Cafe".into(), seoul_city_hall(), 50.0)
    .await
    .unwrap();

  let err = h
    .engine
    .geofence
    .update_geofence(target.target_id, Uuid::new_v4(), None, Some(500.0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotOwner { .. }));

  let updated = h
    .engine
    .geofence
    .update_geofence(target.target_id, owner, None, Some(500.0))
    .await
    .unwrap();
  assert_eq!(updated.radius_meters, 500.0);
  assert_eq!(updated.center, target.center);
  assert_eq!(updated.name, "Cafe");
}

// ─── QR ──────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn fresh_qr_code_admits_without_gps() {
  let h = harness().await;
  let target = city_hall(&h, 100.0).await;
  let user = Uuid::new_v4();

  let raw = h.engine.geofence.issue_qr_token(target).await.unwrap().encode().unwrap();
  let outcome = h.engine.geofence.verify_qr(user, &raw).await.unwrap();

  let check_in = outcome.check_in();
  assert_eq!(check_in.method, CheckInMethod::Qr);
  assert_eq!(check_in.coordinate, Coordinate::ORIGIN);
  assert!(check_in.address.is_none());
  assert!(h.store.is_active_member(user, target).await.unwrap());
}

#[tokio::test]
async fn qr_code_past_its_window_is_expired() {
  let h = harness().await;
  let target = city_hall(&h, 100.0).await;
  let now = Utc::now();

  let raw = h
    .signer
    .issue(target, now - Duration::milliseconds(QR_TTL_MS + 1))
    .encode()
    .unwrap();
  let err = h
    .engine
    .geofence
    .verify_qr_at(Uuid::new_v4(), &raw, now)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Expired { age_ms } if age_ms == QR_TTL_MS + 1));
}

#[tokio::test]
async fn tampered_qr_code_is_rejected() {
  let h = harness().await;
  let target = city_hall(&h, 100.0).await;
  let other = city_hall(&h, 100.0).await;

  let mut payload = h.signer.issue(target, Utc::now());
  payload.group_id = other.to_string();
  let err = h
    .engine
    .geofence
    .verify_qr(Uuid::new_v4(), &payload.encode().unwrap())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidSignature));
  assert!(h.engine.geofence.check_ins(other, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn garbage_qr_payload_is_a_validation_error() {
  let h = harness().await;
  let err = h.engine.geofence.verify_qr(Uuid::new_v4(), "not json").await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn signed_code_for_unknown_group_is_not_found() {
  let h = harness().await;
  let raw = h.signer.issue(Uuid::new_v4(), Utc::now()).encode().unwrap();
  let err = h.engine.geofence.verify_qr(Uuid::new_v4(), &raw).await.unwrap_err();
  assert!(err.is_not_found());
}
