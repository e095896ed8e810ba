//! Structural decoding of scanned payloads.

use crate::{Error, QrPayload, Result};

/// Decode the JSON document. Any parse failure, including missing fields or
/// wrong field types, is reported as [`Error::Malformed`].
pub(crate) fn decode(raw: &str) -> Result<QrPayload> {
  let raw = raw.trim();
  if raw.is_empty() {
    return Err(Error::Malformed("empty payload".to_owned()));
  }
  serde_json::from_str(raw).map_err(|e| Error::Malformed(e.to_string()))
}
