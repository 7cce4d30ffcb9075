use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Header Webex puts the webhook signature in.
pub const SIGNATURE_HEADER: &str = "X-Spark-Signature";

/// Verifies a Webex webhook signature using constant-time comparison.
///
/// Webex sends `X-Spark-Signature: <hex>`, the HMAC-SHA1 of the raw request body keyed
/// with the secret given when the webhook was registered.
pub fn verify(secret: &str, body: &[u8], signature_header: &str) -> bool {
    let Ok(expected) = hex::decode(signature_header.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha1::new_from_slice(secret.as_bytes()) else {
        return false;
    };

    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Hex HMAC-SHA1 of `body`, as Webex would send it.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = match HmacSha1::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
