//! Notion webhook signature verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Validate the `X-Notion-Signature` header (`sha256=<hex>`) against the
/// raw request body. Comparison is constant-time.
pub fn verify(secret: &str, body: &[u8], signature_header: Option<&str>) -> bool {
    let Some(header) = signature_header else {
        tracing::warn!("Missing X-Notion-Signature header");
        return false;
    };

    let Some(hex_digest) = header.strip_prefix("sha256=") else {
        tracing::warn!("Malformed signature header");
        return false;
    };

    let Ok(expected) = hex::decode(hex_digest) else {
        tracing::warn!("Signature header is not valid hex");
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}
