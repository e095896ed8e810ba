//! Handlers for meetups and blind feature matching.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/meetings` | Body: `{"title":"..."}` |
//! | `POST` | `/meetings/{id}/participants` | Join or rejoin with features |
//! | `PUT`  | `/participants/{id}/features` | Replace features; reruns matching |
//! | `POST` | `/participants/{id}/leave` | Idempotent |
//! | `GET`  | `/participants/{id}/matches` | Auto-matches involving the participant |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use proxima_core::{
  matches::AutoMatch,
  meetup::{FeatureSet, Participant},
};
use proxima_engine::{Engine, Ports};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateMeetingBody {
  pub title: String,
}

/// `POST /meetings`
pub async fn create<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Json(body): Json<CreateMeetingBody>,
) -> Result<impl IntoResponse, ApiError> {
  let meeting = engine.matcher.create_meeting(body.title).await?;
  Ok((StatusCode::CREATED, Json(meeting)))
}

// ─── Participation ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct JoinBody {
  pub user_id:  Uuid,
  pub nickname: String,
  /// `my_features` and `looking_for`, both optional.
  #[serde(flatten)]
  pub features: FeatureSet,
}

/// `POST /meetings/{id}/participants`
pub async fn join<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(meeting_id): Path<Uuid>,
  Json(body): Json<JoinBody>,
) -> Result<impl IntoResponse, ApiError> {
  let participant = engine
    .matcher
    .join(body.user_id, meeting_id, body.nickname, body.features)
    .await?;
  Ok((StatusCode::CREATED, Json(participant)))
}

/// `POST /participants/{id}/leave`
pub async fn leave<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Participant>, ApiError> {
  Ok(Json(engine.matcher.leave(id).await?))
}

/// `PUT /participants/{id}/features`: `{"created": <n>}`
pub async fn update_features<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
  Json(features): Json<FeatureSet>,
) -> Result<Json<Value>, ApiError> {
  let created = engine.matcher.update_features(id, features).await?;
  Ok(Json(json!({ "created": created })))
}

/// `GET /participants/{id}/matches`
pub async fn matches<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AutoMatch>>, ApiError> {
  Ok(Json(engine.matcher.matches_for(id).await?))
}
