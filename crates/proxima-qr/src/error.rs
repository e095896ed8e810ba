//! Error types for the proxima-qr codec.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("QR signing secret must not be empty")]
  EmptySecret,

  #[error("malformed QR payload: {0}")]
  Malformed(String),

  #[error("unsupported QR payload type: {0:?}")]
  WrongType(String),

  #[error("QR signature does not match")]
  InvalidSignature,

  #[error("QR code expired {age_ms} ms after issuance")]
  Expired { age_ms: i64 },

  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
