//! Access token payload decoding
//!
//! # Not verification
//!
//! Everything in this module is display-only. The signature segment of the
//! token is never checked; claims are read so the client can show who is
//! logged in. The backend remains the only authority on whether a token is
//! valid, and a forged token will be rejected by the first protected call.
//!
//! # Pure Functions
//!
//! No I/O and no HTTP dependencies. Malformed input yields `None`, never a
//! panic.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::{Map, Value};

use crate::models::User;

// ========================================
// Payload Decoding
// ========================================

/// Decode the payload segment of a JWT without verifying it
///
/// Splits on `.`, base64url-decodes the second segment and parses it as a
/// JSON object. Padding and the standard base64 alphabet are tolerated.
///
/// # Examples
///
/// ```
/// use skc_common::api::auth::decode_claims;
///
/// // {"sub":"42","name":"Mina"}
/// let token = "eyJhbGciOiJIUzI1NiJ9.eyJzdWIiOiI0MiIsIm5hbWUiOiJNaW5hIn0.sig";
/// let claims = decode_claims(token).unwrap();
/// assert_eq!(claims["name"], "Mina");
///
/// assert!(decode_claims("not-a-token").is_none());
/// ```
pub fn decode_claims(token: &str) -> Option<Map<String, Value>> {
    let payload = token.trim().split('.').nth(1)?;
    if payload.is_empty() {
        return None;
    }

    let bytes = decode_segment(payload)?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    let normalized: String = segment
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    URL_SAFE_NO_PAD.decode(normalized.as_bytes()).ok()
}

// ========================================
// User Derivation
// ========================================

/// Build the display user from decoded claims
///
/// - `id`: `sub`, else `user_id`, else `"unknown"`
/// - `email`: `email`, else empty
/// - `name`: `name`, else the email, else `"User"`
/// - `picture`: `picture` when present
pub fn user_from_claims(claims: &Map<String, Value>) -> User {
    let email = claim_string(claims, "email");
    let name = claim_string(claims, "name")
        .or_else(|| email.clone())
        .unwrap_or_else(|| "User".to_string());

    User {
        id: claim_string(claims, "sub")
            .or_else(|| claim_string(claims, "user_id"))
            .unwrap_or_else(|| "unknown".to_string()),
        email: email.unwrap_or_default(),
        name,
        picture: claim_string(claims, "picture"),
    }
}

/// Decode a token straight to its display user
pub fn decode_user(token: &str) -> Option<User> {
    decode_claims(token).map(|claims| user_from_claims(&claims))
}

/// String view of a claim; numeric ids are rendered, empty strings skipped
fn claim_string(claims: &Map<String, Value>, key: &str) -> Option<String> {
    match claims.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ========================================
// Tests
// ========================================
