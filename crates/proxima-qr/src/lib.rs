//! Signed QR admission codes for location groups.
//!
//! A QR code carries a small JSON document:
//!
//! ```text
//! {"type":"location_group","groupId":"<uuid>","timestamp":<epoch-ms>,"signature":"<16 hex>"}
//! ```
//!
//! The signature is `HMAC-SHA256(secret, groupId)`, hex-encoded and cut to
//! its first 16 characters. It depends on the group only, so every code ever
//! printed for a group carries the same signature; freshness comes solely
//! from `timestamp`, which must be at most [`QR_TTL_MS`] old when the code is
//! scanned. Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use chrono::Utc;
//! use proxima_qr::QrSigner;
//! use uuid::Uuid;
//!
//! let signer = QrSigner::new(b"server-secret").unwrap();
//! let payload = signer.issue(Uuid::new_v4(), Utc::now());
//! let scanned = payload.encode().unwrap();
//! let group_id = signer.verify(&scanned, Utc::now()).unwrap();
//! assert_eq!(group_id.to_string(), payload.group_id);
//! ```

pub mod error;
mod parse;
mod sign;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use error::{Error, Result};
pub use sign::QrSigner;

/// The only payload `type` this codec understands.
pub const PAYLOAD_TYPE: &str = "location_group";

/// How long after issuance a scanned code is still accepted.
pub const QR_TTL_MS: i64 = 5 * 60 * 1000;

/// Number of hex characters of the HMAC kept in the payload.
pub const SIGNATURE_HEX_LEN: usize = 16;

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The document encoded into a QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrPayload {
  #[serde(rename = "type")]
  pub kind:      String,
  /// Hyphenated group UUID; the signed subject.
  pub group_id:  String,
  /// Issuance time, milliseconds since the Unix epoch.
  pub timestamp: i64,
  pub signature: String,
}

impl QrPayload {
  /// Serialize to the compact JSON form rendered into the QR image.
  pub fn encode(&self) -> Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  /// Parse the JSON form. Structural problems are reported as
  /// [`Error::Malformed`]; no signature or freshness check happens here.
  pub fn decode(raw: &str) -> Result<Self> {
    parse::decode(raw)
  }

  pub fn issued_at(&self) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(self.timestamp)
  }
}

impl QrSigner {
  /// Build a fresh payload for `group_id` stamped with `now`.
  pub fn issue(&self, group_id: Uuid, now: DateTime<Utc>) -> QrPayload {
    let group_id = group_id.hyphenated().to_string();
    QrPayload {
      kind:      PAYLOAD_TYPE.to_owned(),
      signature: self.sign(&group_id),
      group_id,
      timestamp: now.timestamp_millis(),
    }
  }

  /// Decode and check a scanned payload against `now`.
  ///
  /// Checks run in order: structure, type, signature, freshness. Returns the
  /// admitted group id.
  pub fn verify(&self, raw: &str, now: DateTime<Utc>) -> Result<Uuid> {
    let payload = QrPayload::decode(raw)?;
    self.verify_payload(&payload, now)
  }

  /// Like [`QrSigner::verify`] for an already-decoded payload.
  pub fn verify_payload(&self, payload: &QrPayload, now: DateTime<Utc>) -> Result<Uuid> {
    if payload.kind != PAYLOAD_TYPE {
      return Err(Error::WrongType(payload.kind.clone()));
    }
    if !self.signature_matches(&payload.group_id, &payload.signature) {
      return Err(Error::InvalidSignature);
    }

    if payload.issued_at().is_none() {
      return Err(Error::Malformed(format!("timestamp out of range: {}", payload.timestamp)));
    }
    let age_ms = now
      .timestamp_millis()
      .checked_sub(payload.timestamp)
      .ok_or_else(|| Error::Malformed(format!("timestamp out of range: {}", payload.timestamp)))?;
    if age_ms > QR_TTL_MS {
      return Err(Error::Expired { age_ms });
    }

    Uuid::parse_str(&payload.group_id)
      .map_err(|e| Error::Malformed(format!("groupId: {e}")))
  }
}
