//! Handlers for the match ledger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/matches` | Idempotent per pair and group |
//! | `GET`  | `/matches/{id}` | 404 if not found |
//! | `POST` | `/matches/{id}/status` | Forward-only; 409 otherwise |
//! | `POST` | `/matches/{id}/messages` | Counts one message |
//! | `GET`  | `/matches/{id}/mutual` | `?user_id` must be a party |
//! | `POST` | `/matches/expire` | Expire stale active matches |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use proxima_core::matches::{Match, MatchStatus};
use proxima_engine::{Engine, Ports};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateMatchBody {
  pub user_a:   Uuid,
  pub user_b:   Uuid,
  pub group_id: Option<Uuid>,
}

/// `POST /matches`: returns the existing match when there already is one.
pub async fn create<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Json(body): Json<CreateMatchBody>,
) -> Result<Json<Match>, ApiError> {
  let m = engine
    .ledger
    .create_match_if_absent(body.user_a, body.user_b, body.group_id)
    .await?;
  Ok(Json(m))
}

/// `GET /matches/{id}`
pub async fn get_one<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Match>, ApiError> {
  Ok(Json(engine.ledger.get_match(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: MatchStatus,
}

/// `POST /matches/{id}/status` with a body like `{"status":"expired"}`
pub async fn set_status<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Match>, ApiError> {
  Ok(Json(engine.ledger.transition(id, body.status).await?))
}

/// `POST /matches/{id}/messages`
pub async fn record_message<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Match>, ApiError> {
  Ok(Json(engine.ledger.record_message(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct MutualParams {
  pub user_id: Uuid,
}

/// `GET /matches/{id}/mutual?user_id=<id>`
pub async fn mutual<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(id): Path<Uuid>,
  Query(params): Query<MutualParams>,
) -> Result<Json<Vec<Uuid>>, ApiError> {
  Ok(Json(engine.ledger.mutual_connections(id, params.user_id).await?))
}

// ─── Expiry ──────────────────────────────────────────────────────────────────

fn default_older_than_days() -> u32 { 7 }
fn default_true() -> bool { true }

#[derive(Debug, Deserialize)]
pub struct ExpireBody {
  #[serde(default = "default_older_than_days")]
  pub older_than_days:     u32,
  #[serde(default = "default_true")]
  pub require_no_messages: bool,
}

/// `POST /matches/expire`: `{"expired": <n>}`
pub async fn expire<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Json(body): Json<ExpireBody>,
) -> Result<Json<Value>, ApiError> {
  let expired = engine
    .ledger
    .expire_inactive_matches(body.older_than_days, body.require_no_messages)
    .await?;
  Ok(Json(json!({ "expired": expired })))
}
