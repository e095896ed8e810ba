//! Handlers for candidate discovery and likes.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/groups/{id}/recommendations` | `?user_id` required; optional `count` |
//! | `POST` | `/likes` | Returns the match when the like is mutual |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use proxima_core::ranking::ScoredCandidate;
use proxima_engine::{Engine, Ports};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::error::ApiError;

const DEFAULT_COUNT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct RecommendParams {
  /// The browsing user; must be an active member of the group.
  pub user_id: Uuid,
  pub count:   Option<usize>,
}

/// `GET /groups/{id}/recommendations?user_id=<id>[&count=<n>]`
pub async fn recommendations<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Path(group_id): Path<Uuid>,
  Query(params): Query<RecommendParams>,
) -> Result<Json<Vec<ScoredCandidate>>, ApiError> {
  let count = params.count.unwrap_or(DEFAULT_COUNT);
  Ok(Json(engine.ranker.recommend(params.user_id, group_id, count).await?))
}

#[derive(Debug, Deserialize)]
pub struct LikeBody {
  pub from_user_id: Uuid,
  pub to_user_id:   Uuid,
  pub group_id:     Option<Uuid>,
}

/// `POST /likes`: `{"matched": bool, "match": <match or null>}`
pub async fn like<P: Ports>(
  State(engine): State<Arc<Engine<P>>>,
  Json(body): Json<LikeBody>,
) -> Result<Json<Value>, ApiError> {
  let m = engine
    .ledger
    .record_like(body.from_user_id, body.to_user_id, body.group_id)
    .await?;
  Ok(Json(json!({ "matched": m.is_some(), "match": m })))
}
