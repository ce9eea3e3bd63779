//! HS256 token issuing and verification for the stub backend.

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::session::token::{decode_segment, encode_segment};

type HmacSha256 = Hmac<Sha256>;

/// Why a presented token was rejected. Messages mirror flask-jwt-extended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenRejection {
    Missing,
    Malformed,
    BadSignature,
    Expired,
}

impl TokenRejection {
    pub fn message(&self) -> &'static str {
        match self {
            TokenRejection::Missing => "Missing Authorization Header",
            TokenRejection::Malformed => "Not enough segments",
            TokenRejection::BadSignature => "Signature verification failed",
            TokenRejection::Expired => "Token has expired",
        }
    }
}

fn keyed_mac(secret: &[u8], signing_input: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(signing_input.as_bytes());
    Some(mac)
}

/// Issue a token for `subject` valid for `ttl` from `now`. `None` when the
/// secret cannot key the MAC.
pub fn issue(
    secret: &[u8],
    subject: &str,
    roles: &[String],
    now: DateTime<Utc>,
    ttl: Duration,
) -> Option<String> {
    let header = json!({ "alg": "HS256", "typ": "JWT" });
    let claims = json!({
        "sub": subject,
        "roles": roles,
        "iat": now.timestamp(),
        "exp": (now + ttl).timestamp(),
    });

    let signing_input = format!(
        "{}.{}",
        encode_segment(header.to_string().as_bytes()),
        encode_segment(claims.to_string().as_bytes())
    );
    let signature = encode_segment(&keyed_mac(secret, &signing_input)?.finalize().into_bytes());
    Some(format!("{signing_input}.{signature}"))
}

/// Verify signature and expiry; returns the subject.
pub fn verify(secret: &[u8], token: &str, now: DateTime<Utc>) -> Result<String, TokenRejection> {
    let segments: Vec<&str> = token.split('.').collect();
    let [header, payload, signature] = segments.as_slice() else {
        return Err(TokenRejection::Malformed);
    };

    let presented = decode_segment(signature).map_err(|_| TokenRejection::Malformed)?;
    keyed_mac(secret, &format!("{header}.{payload}"))
        .ok_or(TokenRejection::BadSignature)?
        .verify_slice(&presented)
        .map_err(|_| TokenRejection::BadSignature)?;

    let claims: serde_json::Value = decode_segment(payload)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .ok_or(TokenRejection::Malformed)?;

    let exp = claims
        .get("exp")
        .and_then(|e| e.as_i64())
        .ok_or(TokenRejection::Malformed)?;
    if exp <= now.timestamp() {
        return Err(TokenRejection::Expired);
    }

    claims
        .get("sub")
        .and_then(|s| s.as_str())
        .map(str::to_string)
        .ok_or(TokenRejection::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::token::is_unexpired;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_issue_and_verify() {
        let now = Utc::now();
        let token = issue(SECRET, "1", &["ADMIN".into()], now, Duration::hours(1)).unwrap();

        assert_eq!(verify(SECRET, &token, now), Ok("1".to_string()));
        // The client-side check agrees
        assert!(is_unexpired(&token, now));
    }

    #[test]
    fn test_empty_secret_still_signs() {
        let now = Utc::now();
        let token = issue(b"", "1", &[], now, Duration::hours(1)).unwrap();
        assert_eq!(verify(b"", &token, now), Ok("1".to_string()));
    }

    #[test]
    fn test_wrong_secret() {
        let now = Utc::now();
        let token = issue(SECRET, "1", &[], now, Duration::hours(1)).unwrap();
        assert_eq!(
            verify(b"other", &token, now),
            Err(TokenRejection::BadSignature)
        );
    }

    #[test]
    fn test_expired() {
        let now = Utc::now();
        let token = issue(SECRET, "1", &[], now, Duration::hours(1)).unwrap();
        assert_eq!(
            verify(SECRET, &token, now + Duration::hours(2)),
            Err(TokenRejection::Expired)
        );
    }

    #[test]
    fn test_tampered_payload() {
        let now = Utc::now();
        let token = issue(SECRET, "1", &[], now, Duration::hours(1)).unwrap();
        let other = issue(SECRET, "2", &[], now, Duration::hours(1)).unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = other.split('.').nth(1).unwrap();
        let forged = parts.join(".");

        assert_eq!(verify(SECRET, &forged, now), Err(TokenRejection::BadSignature));
    }

    #[test]
    fn test_malformed() {
        assert_eq!(
            verify(SECRET, "abc", Utc::now()),
            Err(TokenRejection::Malformed)
        );
    }
}
