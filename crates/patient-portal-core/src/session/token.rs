//! Client-side JWT inspection.
//!
//! Only the payload is decoded; signatures are the backend's concern. Any
//! decoding problem makes the token count as expired.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Token decoding errors.
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token must have three dot-separated segments")]
    Malformed,

    #[error("Invalid base64 segment: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Invalid claims JSON: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("Token has no expiry claim")]
    MissingExpiry,
}

pub type TokenResult<T> = Result<T, TokenError>;

/// The registered claims the client looks at.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<f64>,
    /// Issued-at, seconds since the Unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<f64>,
}

/// Base64url-encode a token segment without padding.
pub fn encode_segment(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decode a token segment; trailing padding is tolerated.
pub fn decode_segment(segment: &str) -> TokenResult<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(segment.trim_end_matches('='))?)
}

/// Decode the payload segment of a JWT.
pub fn decode_claims(token: &str) -> TokenResult<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments[1].is_empty() {
        return Err(TokenError::Malformed);
    }

    let payload = decode_segment(segments[1])?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Expiry of the token as seconds since the epoch.
pub fn expires_at(token: &str) -> TokenResult<f64> {
    decode_claims(token)?.exp.ok_or(TokenError::MissingExpiry)
}

/// True only if the token decodes and its expiry lies after `now`.
pub fn is_unexpired(token: &str, now: DateTime<Utc>) -> bool {
    let current = now.timestamp_millis() as f64 / 1000.0;
    match expires_at(token) {
        Ok(exp) => exp > current,
        Err(_) => false,
    }
}
