//! HMAC-SHA256 request signing for the backend proxy.
//!
//! The signature covers `{timestamp}.{body}` so a captured request cannot be
//! replayed with a different payload or at a different time. The backend
//! verifies the same construction.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex-encoded HMAC-SHA256 signature for a request body.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");

    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);

    hex::encode(mac.finalize().into_bytes())
}

/// Current unix time as the string the signature covers.
pub fn unix_timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic() {
        let sig1 = compute_signature("secret", "1706400000", b"payload");
        let sig2 = compute_signature("secret", "1706400000", b"payload");
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn signature_changes_with_different_secret() {
        let sig1 = compute_signature("secret1", "1706400000", b"payload");
        let sig2 = compute_signature("secret2", "1706400000", b"payload");
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn signature_changes_with_different_timestamp() {
        let sig1 = compute_signature("secret", "1706400000", b"payload");
        let sig2 = compute_signature("secret", "1706400001", b"payload");
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn signature_changes_with_different_body() {
        let sig1 = compute_signature("secret", "1706400000", b"payload1");
        let sig2 = compute_signature("secret", "1706400000", b"payload2");
        assert_ne!(sig1, sig2);
    }

    #[test]
    fn signature_is_hex_encoded() {
        let sig = compute_signature("secret", "1706400000", b"payload");
        // SHA256 = 32 bytes = 64 hex chars
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
