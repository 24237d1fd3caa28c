//! HMAC-SHA256 signing for Standard Webhooks compliance.
//!
//! Standard Webhooks uses the following signature scheme:
//! - Signature is computed over: `{msg_id}.{timestamp}.{payload}`
//! - The signature is base64-encoded HMAC-SHA256
//! - Headers include: `webhook-id`, `webhook-timestamp`, `webhook-signature`
//!
//! See: <https://www.standardwebhooks.com/>

use base64::{Engine, engine::general_purpose::STANDARD as BASE64_STANDARD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Prefix for webhook secrets
pub const SECRET_PREFIX: &str = "whsec_";

/// Generate a new webhook secret.
///
/// Returns a `whsec_` prefixed base64-encoded 32-byte random secret.
pub fn generate_secret() -> String {
    use rand::RngCore;

    let mut secret_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut secret_bytes);

    format!("{}{}", SECRET_PREFIX, BASE64_STANDARD.encode(secret_bytes))
}

/// Extract the raw secret bytes from a `whsec_` prefixed secret.
///
/// Returns `None` if the secret doesn't have the correct prefix or invalid base64.
pub fn decode_secret(secret: &str) -> Option<Vec<u8>> {
    let encoded = secret.strip_prefix(SECRET_PREFIX)?;
    BASE64_STANDARD.decode(encoded).ok()
}

/// The keyed MAC over the Standard Webhooks signed content.
fn signed_content_mac(msg_id: &str, timestamp: i64, payload: &str, secret: &str) -> Option<HmacSha256> {
    let secret_bytes = decode_secret(secret)?;
    let mut mac = HmacSha256::new_from_slice(&secret_bytes).ok()?;
    mac.update(format!("{msg_id}.{timestamp}.{payload}").as_bytes());
    Some(mac)
}

/// Sign a webhook payload according to Standard Webhooks spec.
///
/// The signature is computed over `{msg_id}.{timestamp}.{payload}` and
/// returned as `v1,{base64-hmac-sha256}`. `msg_id` is the stable event ID
/// sent in the `webhook-id` header, `timestamp` is unix seconds.
pub fn sign_payload(msg_id: &str, timestamp: i64, payload: &str, secret: &str) -> Option<String> {
    let mac = signed_content_mac(msg_id, timestamp, payload, secret)?;
    let signature = mac.finalize().into_bytes();
    Some(format!("v1,{}", BASE64_STANDARD.encode(signature)))
}

/// Verify a webhook signature against the header values a subscriber received.
///
/// Returns `true` only for a well-formed `v1,` signature that matches the
/// recomputed HMAC. The comparison runs in constant time (hmac's
/// `verify_slice`), so subscribers can expose this on an endpoint without
/// leaking the signature byte by byte.
pub fn verify_signature(msg_id: &str, timestamp: i64, payload: &str, signature: &str, secret: &str) -> bool {
    let Some(encoded) = signature.strip_prefix("v1,") else {
        return false;
    };
    let Ok(claimed) = BASE64_STANDARD.decode(encoded) else {
        return false;
    };
    let Some(mac) = signed_content_mac(msg_id, timestamp, payload, secret) else {
        return false;
    };
    mac.verify_slice(&claimed).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secrets_decode_to_32_bytes() {
        let secret = generate_secret();
        assert!(secret.starts_with(SECRET_PREFIX));
        assert_eq!(decode_secret(&secret).unwrap().len(), 32);
    }

    #[test]
    fn decode_rejects_bad_prefix_and_bad_base64() {
        assert!(decode_secret("invalid_secret").is_none());
        assert!(decode_secret("whsec_not-valid-base64!!!").is_none());
    }

    #[test]
    fn sign_then_verify_roundtrip() {
        let secret = generate_secret();
        let msg_id = "9d3f38e3-6f4b-4c5d-8a10-2f6d1a0d1f2e";
        let timestamp = 1704067200; // 2024-01-01 00:00:00 UTC
        let payload = r#"{"type":"user.created","data":{}}"#;

        let signature = sign_payload(msg_id, timestamp, payload, &secret).expect("should sign");
        assert!(signature.starts_with("v1,"));
        assert!(verify_signature(msg_id, timestamp, payload, &signature, &secret));
    }

    #[test]
    fn verify_rejects_any_tampered_input() {
        let secret = generate_secret();
        let msg_id = "9d3f38e3-6f4b-4c5d-8a10-2f6d1a0d1f2e";
        let timestamp = 1704067200;
        let payload = r#"{"type":"user.created","data":{}}"#;
        let signature = sign_payload(msg_id, timestamp, payload, &secret).expect("should sign");

        assert!(!verify_signature(msg_id, timestamp, "wrong", &signature, &secret));
        assert!(!verify_signature(msg_id, timestamp + 1, payload, &signature, &secret));
        assert!(!verify_signature("wrong", timestamp, payload, &signature, &secret));
        assert!(!verify_signature(msg_id, timestamp, payload, &signature, &generate_secret()));
    }

    #[test]
    fn verify_rejects_malformed_signature_header() {
        let secret = generate_secret();
        assert!(!verify_signature("id", 123, "payload", "invalid", &secret));
        assert!(!verify_signature("id", 123, "payload", "v2,abc", &secret));
        assert!(!verify_signature("id", 123, "payload", "v1,###", &secret));
    }

    #[test]
    fn signature_is_deterministic_for_fixed_inputs() {
        // Known inputs always produce the same signature, so subscribers can
        // recompute it from the Standard Webhooks spec alone
        let secret = "whsec_MfKQ9r8GKYqrTwjUPD8ILPZIo2LaLaSw";
        let msg_id = "9d3f38e3-6f4b-4c5d-8a10-2f6d1a0d1f2e";
        let timestamp = 1614265330;
        let payload = r#"{"type":"account.created"}"#;

        let first = sign_payload(msg_id, timestamp, payload, secret).expect("should sign");
        let second = sign_payload(msg_id, timestamp, payload, secret).expect("should sign");
        assert_eq!(first, second);
        assert!(verify_signature(msg_id, timestamp, payload, &first, secret));
    }
}
