//! GeoFence Verifier: admits users to location groups by GPS proximity or
//! by scanning a signed QR code.
//!
//! Rejections never write a check-in row and never grant membership. Every
//! admission appends exactly one [`CheckIn`] and then either grants
//! membership or reports [`CheckInOutcome::AlreadyMember`].

use std::{convert::Infallible, sync::Arc};

use chrono::{DateTime, Utc};
use proxima_core::{
  geo::{Coordinate, OperatingRegion, bearing_degrees, distance_meters, validate_coordinate},
  store::{EngineStore, ReverseGeocoder},
  target::{
    CheckIn, CheckInMethod, LocationTarget, Membership, NewCheckIn, NewTarget,
    validate_radius,
  },
};
use proxima_qr::{QrPayload, QrSigner};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  events::{ActivityEntry, ActivityKind, EngineEvent, EventSink},
};

// ─── Geocoding fallback ──────────────────────────────────────────────────────

/// A geocoder that never calls out and always answers with
/// [`Coordinate::fallback_label`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackGeocoder;

impl ReverseGeocoder for FallbackGeocoder {
  type Error = Infallible;

  async fn reverse(&self, at: Coordinate) -> Result<String, Infallible> {
    Ok(at.fallback_label())
  }
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// A successful admission.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckInOutcome {
  /// The user was not a member before; membership has been granted.
  Admitted {
    check_in:   CheckIn,
    membership: Membership,
  },
  /// The user was already an active member; only the check-in was logged.
  AlreadyMember { check_in: CheckIn },
}

impl CheckInOutcome {
  pub fn check_in(&self) -> &CheckIn {
    match self {
      Self::Admitted { check_in, .. } | Self::AlreadyMember { check_in } => check_in,
    }
  }

  pub fn is_already_member(&self) -> bool {
    matches!(self, Self::AlreadyMember { .. })
  }
}

// ─── Verifier ────────────────────────────────────────────────────────────────

pub struct GeoFenceVerifier<S, E, G = FallbackGeocoder> {
  store:    Arc<S>,
  events:   Arc<E>,
  geocoder: Arc<G>,
  signer:   QrSigner,
  region:   Option<OperatingRegion>,
}

impl<S, E, G> GeoFenceVerifier<S, E, G>
where
  S: EngineStore,
  E: EventSink,
  G: ReverseGeocoder,
{
  pub fn new(
    store: Arc<S>,
    events: Arc<E>,
    geocoder: Arc<G>,
    signer: QrSigner,
    region: Option<OperatingRegion>,
  ) -> Self {
    Self { store, events, geocoder, signer, region }
  }

  fn validate(&self, c: Coordinate) -> Result<()> {
    Ok(validate_coordinate(c, self.region.as_ref())?)
  }

  // ── Targets ───────────────────────────────────────────────────────────

  /// Publish a new geofenced target.
  pub async fn register_target(
    &self,
    owner_id: Uuid,
    name: String,
    center: Coordinate,
    radius_meters: f64,
  ) -> Result<LocationTarget> {
    let name = name.trim().to_owned();
    if name.is_empty() {
      return Err(Error::Validation("target name must not be empty".into()));
    }
    self.validate(center)?;
    validate_radius(radius_meters)?;

    let target = self
      .store
      .add_target(NewTarget { owner_id, name, center, radius_meters })
      .await
      .map_err(Error::store)?;
    info!(target_id = %target.target_id, radius_meters, "target registered");
    Ok(target)
  }

  pub async fn get_target(&self, target_id: Uuid) -> Result<LocationTarget> {
    self
      .store
      .get_target(target_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::TargetNotFound(target_id))
  }

  /// Move or resize a target's geofence. Only the owner may do this; every
  /// other field of a published target is immutable.
  pub async fn update_geofence(
    &self,
    target_id: Uuid,
    owner_id: Uuid,
    center: Option<Coordinate>,
    radius_meters: Option<f64>,
  ) -> Result<LocationTarget> {
    let current = self.get_target(target_id).await?;
    if current.owner_id != owner_id {
      return Err(Error::NotOwner { user_id: owner_id, target_id });
    }

    let center = center.unwrap_or(current.center);
    let radius_meters = radius_meters.unwrap_or(current.radius_meters);
    self.validate(center)?;
    validate_radius(radius_meters)?;

    let updated = self
      .store
      .update_geofence(target_id, center, radius_meters)
      .await
      .map_err(Error::store)?
      .ok_or(Error::TargetNotFound(target_id))?;
    info!(%target_id, radius_meters, "geofence updated");
    Ok(updated)
  }

  // ── GPS admission ─────────────────────────────────────────────────────

  /// Admit `user_id` to `target_id` if `claimed` lies within the geofence.
  /// A claim exactly on the boundary is inside.
  pub async fn verify_gps(
    &self,
    user_id: Uuid,
    target_id: Uuid,
    claimed: Coordinate,
    accuracy_meters: Option<f64>,
  ) -> Result<CheckInOutcome> {
    self.validate(claimed)?;
    if let Some(acc) = accuracy_meters.filter(|a| !(a.is_finite() && *a >= 0.0)) {
      return Err(Error::Validation(format!("invalid GPS accuracy: {acc}")));
    }

    let target = self.get_target(target_id).await?;
    let distance = distance_meters(claimed, target.center);

    if distance > target.radius_meters {
      debug!(%user_id, %target_id, distance, "GPS claim outside geofence");
      return Err(Error::OutOfRange {
        distance_meters:  distance,
        radius_meters:    target.radius_meters,
        shortfall_meters: distance - target.radius_meters,
        bearing_degrees:  bearing_degrees(claimed, target.center),
      });
    }

    let address = self.resolve_address(claimed).await;
    self
      .admit(NewCheckIn {
        user_id,
        target_id,
        coordinate: claimed,
        accuracy_meters,
        method: CheckInMethod::Gps,
        address: Some(address),
      })
      .await
  }

  /// Reverse-geocode `at`, degrading to a coordinate label on any failure.
  async fn resolve_address(&self, at: Coordinate) -> String {
    match self.geocoder.reverse(at).await {
      Ok(label) if !label.trim().is_empty() => label,
      Ok(_) => at.fallback_label(),
      Err(e) => {
        warn!(error = %e, "reverse geocoding failed; using coordinates");
        at.fallback_label()
      }
    }
  }

  // ── QR admission ──────────────────────────────────────────────────────

  /// Produce the payload to render as a QR code for `target_id`.
  pub async fn issue_qr_token(&self, target_id: Uuid) -> Result<QrPayload> {
    let target = self.get_target(target_id).await?;
    Ok(self.signer.issue(target.target_id, Utc::now()))
  }

  /// Admit `user_id` using a scanned QR payload.
  pub async fn verify_qr(&self, user_id: Uuid, raw: &str) -> Result<CheckInOutcome> {
    self.verify_qr_at(user_id, raw, Utc::now()).await
  }

  /// [`Self::verify_qr`] against an explicit wall-clock time.
  pub async fn verify_qr_at(
    &self,
    user_id: Uuid,
    raw: &str,
    now: DateTime<Utc>,
  ) -> Result<CheckInOutcome> {
    let group_id = self.signer.verify(raw, now).inspect_err(|e| {
      debug!(%user_id, error = %e, "QR admission rejected");
    })?;
    let target = self.get_target(group_id).await?;

    self
      .admit(NewCheckIn {
        user_id,
        target_id: target.target_id,
        coordinate: Coordinate::ORIGIN,
        accuracy_meters: None,
        method: CheckInMethod::Qr,
        address: None,
      })
      .await
  }

  // ── Shared admission path ─────────────────────────────────────────────

  async fn admit(&self, input: NewCheckIn) -> Result<CheckInOutcome> {
    let (user_id, target_id, method) = (input.user_id, input.target_id, input.method);

    let check_in = self.store.record_check_in(input).await.map_err(Error::store)?;

    let already = self
      .store
      .is_active_member(user_id, target_id)
      .await
      .map_err(Error::store)?;

    let outcome = if already {
      CheckInOutcome::AlreadyMember { check_in }
    } else {
      let membership = self
        .store
        .grant_membership(user_id, target_id)
        .await
        .map_err(Error::store)?;
      CheckInOutcome::Admitted { check_in, membership }
    };

    info!(
      %user_id,
      %target_id,
      %method,
      already_member = outcome.is_already_member(),
      "check-in accepted"
    );
    self.events.emit(EngineEvent::CheckedIn { user_id, target_id, method });
    self.events.emit(EngineEvent::Activity(ActivityEntry::new(
      user_id,
      ActivityKind::CheckedIn,
      format!("checked in at {target_id} via {method}"),
    )));

    Ok(outcome)
  }

  // ── Audit queries ─────────────────────────────────────────────────────

  /// Check-ins recorded at a target, newest first.
  pub async fn check_ins(&self, target_id: Uuid, limit: usize) -> Result<Vec<CheckIn>> {
    self.get_target(target_id).await?;
    self
      .store
      .check_ins_for_target(target_id, limit)
      .await
      .map_err(Error::store)
  }

  /// A user's check-in history, newest first.
  pub async fn location_history(&self, user_id: Uuid, limit: usize) -> Result<Vec<CheckIn>> {
    self
      .store
      .check_ins_for_user(user_id, limit)
      .await
      .map_err(Error::store)
  }
}
