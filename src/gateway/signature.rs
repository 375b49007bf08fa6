use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verify the gateway's webhook signature: hex-encoded HMAC-SHA256 over the
/// raw request body with the shared secret.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = hex::encode(mac.finalize().into_bytes());

    let expected_bytes = expected.as_bytes();
    let provided_bytes = signature.as_bytes();

    // Length check is not constant-time, but that's fine - signature length
    // is not secret (it's always 64 hex chars for SHA-256).
    if expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    // Constant-time comparison to prevent timing attacks.
    expected_bytes.ct_eq(provided_bytes).into()
}

/// Compute the signature a gateway would attach. Used by integration tests
/// and the dev tooling; production webhooks arrive pre-signed.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
