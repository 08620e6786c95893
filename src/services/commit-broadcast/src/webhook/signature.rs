//! GitHub webhook signature verification (`X-Hub-Signature-256`)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

/// Check a raw body against the signature header value.
///
/// An empty secret accepts everything. With a secret set, an empty header
/// never verifies.
pub fn verify(raw_body: &[u8], signature_header: &str, secret: &str) -> bool {
    if secret.is_empty() {
        return true;
    }
    if signature_header.is_empty() {
        return false;
    }

    let provided = signature_header
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature_header);
    let expected = compute_signature(raw_body, secret);

    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

/// Lowercase hex HMAC-SHA256 of `body` keyed by `secret`.
pub fn compute_signature(body: &[u8], secret: &str) -> String {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Full header value as GitHub sends it.
pub fn signature_header(body: &[u8], secret: &str) -> String {
    format!("{}{}", SIGNATURE_PREFIX, compute_signature(body, secret))
}
