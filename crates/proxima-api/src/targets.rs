//! Handlers for location targets and check-ins.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST`  | `/targets` | Body: owner, name, center, radius |
//! | `GET`   | `/targets/{id}` | 404 if not found |
//! | `PATCH` | `/targets/{id}` | Owner only; center and/or radius |
//! | `POST`  | `/targets/{id}/check-in` | GPS admission |
//! | `GET`   | `/targets/{id}/check-ins` | Optional `?limit=` |
//! | `GET`   | `/targets/{id}/qr` | Fresh signed QR payload |
//! | `POST`  | `/check-in/qr` | QR admission |
//! | `GET`   | `/users/{id}/check-ins` | A user's location history |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use proxima_core::{
  geo::Coordinate,
  target::{CheckIn, LocationTarget},
};
use proxima_engine::{CheckInOutcome, Engine, Ports};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

const DEFAULT_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct LimitParams {
  pub limit: Option<usize>,
}

// ─── Targets ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub owner_id:      Uuid,
  pub name:          String,
  pub center:        Coordinate,
  pub radius_meters: f64,
}

/// `POST /targets`
pub async fn register<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError> {
  let target = engine
    .geofence
    .register_target(body.owner_id, body.name, body.center, body.radius_meters)
    .await?;
  Ok((StatusCode::CREATED, Json(target)))
}

/// `GET /targets/{id}`
pub async fn get_one<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<LocationTarget>, ApiError> {
  Ok(Json(engine.geofence.get_target(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct GeofenceBody {
  pub owner_id:      Uuid,
  pub center:        Option<Coordinate>,
  pub radius_meters: Option<f64>,
}

/// `PATCH /targets/{id}`
pub async fn update_geofence<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<GeofenceBody>,
) -> Result<Json<LocationTarget>, ApiError> {
  let target = engine
    .geofence
    .update_geofence(id, body.owner_id, body.center, body.radius_meters)
    .await?;
  Ok(Json(target))
}

// ─── Check-ins ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
  pub already_member: bool,
  #[serde(flatten)]
  pub outcome:        CheckInOutcome,
}

/// 201 for a new membership, 200 for an existing member.
fn admission(outcome: CheckInOutcome) -> (StatusCode, Json<CheckInResponse>) {
  let already_member = outcome.is_already_member();
  let status = if already_member { StatusCode::OK } else { StatusCode::CREATED };
  (status, Json(CheckInResponse { already_member, outcome }))
}

#[derive(Debug, Deserialize)]
pub struct GpsBody {
  pub user_id:         Uuid,
  pub coordinate:      Coordinate,
  pub accuracy_meters: Option<f64>,
}

/// `POST /targets/{id}/check-in`
pub async fn check_in_gps<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<GpsBody>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = engine
    .geofence
    .verify_gps(body.user_id, id, body.coordinate, body.accuracy_meters)
    .await?;
  Ok(admission(outcome))
}

#[derive(Debug, Deserialize)]
pub struct QrBody {
  pub user_id: Uuid,
  /// The scanned QR text, verbatim.
  pub payload: String,
}

/// `POST /check-in/qr`
pub async fn check_in_qr<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Json(body): Json<QrBody>,
) -> Result<impl IntoResponse, ApiError> {
  let outcome = engine.geofence.verify_qr(body.user_id, &body.payload).await?;
  Ok(admission(outcome))
}

/// `GET /targets/{id}/check-ins[?limit=<n>]`
pub async fn list_check_ins<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<CheckIn>>, ApiError> {
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
  Ok(Json(engine.geofence.check_ins(id, limit).await?))
}

/// `GET /users/{id}/check-ins[?limit=<n>]`
pub async fn history<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(user_id): Path<Uuid>,
  Query(params): Query<LimitParams>,
) -> Result<Json<Vec<CheckIn>>, ApiError> {
  let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
  Ok(Json(engine.geofence.location_history(user_id, limit).await?))
}

// ─── QR issuance ─────────────────────────────────────────────────────────────

/// `GET /targets/{id}/qr`: `{"payload": {...}, "encoded": "<qr text>"}`
pub async fn issue_qr<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
  let payload = engine.geofence.issue_qr_token(id).await?;
  let encoded = payload
    .encode()
    .map_err(|e| ApiError::Internal(e.to_string()))?;
  Ok(Json(serde_json::json!({ "payload": payload, "encoded": encoded })))
}
