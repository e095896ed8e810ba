//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use proxima_engine::Error;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Engine(#[from] Error),

  #[error("internal error: {0}")]
  Internal(String),
}

fn status_of(e: &Error) -> StatusCode {
  match e {
    Error::Validation(_) => StatusCode::BAD_REQUEST,
    Error::OutOfRange { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    Error::Expired { .. } => StatusCode::GONE,
    Error::InvalidSignature => StatusCode::UNAUTHORIZED,
    Error::NotAMember { .. } | Error::NotOwner { .. } | Error::NotAParty { .. } => {
      StatusCode::FORBIDDEN
    }
    Error::InvalidTransition { .. } | Error::ParticipantInactive(_) => StatusCode::CONFLICT,
    e if e.is_not_found() => StatusCode::NOT_FOUND,
    _ => StatusCode::INTERNAL_SERVER_ERROR,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let message = self.to_string();
    match self {
      ApiError::Engine(Error::OutOfRange {
        distance_meters,
        radius_meters,
        shortfall_meters,
        bearing_degrees,
      }) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({
          "error": message,
          "distance_meters": distance_meters,
          "radius_meters": radius_meters,
          "shortfall_meters": shortfall_meters,
          "bearing_degrees": bearing_degrees,
        })),
      )
        .into_response(),
      ApiError::Engine(e) => (status_of(&e), Json(json!({ "error": message }))).into_response(),
      ApiError::Internal(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": message }))).into_response()
      }
    }
  }
}
