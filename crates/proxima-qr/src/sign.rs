//! HMAC-SHA256 signing of group ids.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Error, Result, SIGNATURE_HEX_LEN};

type HmacSha256 = Hmac<Sha256>;

/// Issues and checks QR signatures with a server-held secret.
///
/// The keyed MAC state is computed once and cloned per signature. There is
/// no `Debug` impl; the secret must never reach logs.
#[derive(Clone)]
pub struct QrSigner {
  mac: HmacSha256,
}

impl QrSigner {
  pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
    let secret = secret.as_ref();
    if secret.is_empty() {
      return Err(Error::EmptySecret);
    }
    let mac = HmacSha256::new_from_slice(secret).map_err(|_| Error::EmptySecret)?;
    Ok(Self { mac })
  }

  /// `hex(HMAC-SHA256(secret, subject))`, first [`SIGNATURE_HEX_LEN`] chars.
  pub fn sign(&self, subject: &str) -> String {
    let mut mac = self.mac.clone();
    mac.update(subject.as_bytes());
    let mut digest = hex::encode(mac.finalize().into_bytes());
    digest.truncate(SIGNATURE_HEX_LEN);
    digest
  }

  /// Constant-time comparison of a presented signature against the expected
  /// one for `subject`.
  pub(crate) fn signature_matches(&self, subject: &str, presented: &str) -> bool {
    if presented.len() != SIGNATURE_HEX_LEN {
      return false;
    }
    let Ok(tag) = hex::decode(presented) else {
      return false;
    };
    let mut mac = self.mac.clone();
    mac.update(subject.as_bytes());
    mac.verify_truncated_left(&tag).is_ok()
  }
}
