use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::{distr::Alphanumeric, Rng};
use sha2::{Digest, Sha256};

use super::{Params, Session, SessionId};

/// How long an authorization attempt stays redeemable.
pub const PARAMS_TTL_SECS: i64 = 10 * 60;

/// Number of random bytes behind `state`, `nonce` and the PKCE verifier.
const RANDOM_BYTES: usize = 32;

/// Generate a cryptographically random session ID.
pub fn generate_session_id() -> SessionId {
    let id: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    SessionId::new(id)
}

/// Generate a URL-safe random token (43 characters) for `state` or `nonce`.
pub fn generate_url_safe_token() -> String {
    let bytes: [u8; RANDOM_BYTES] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a PKCE code verifier (RFC 7636, 43 characters).
pub fn generate_code_verifier() -> String {
    generate_url_safe_token()
}

/// Compute the S256 code challenge: `BASE64URL(SHA256(verifier))`.
pub fn code_challenge_s256(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Compare two secrets without short-circuiting on the first differing byte.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Check if a session has expired. A session expiring exactly at `now` is expired.
pub fn is_session_expired(session: &Session, now: DateTime<Utc>) -> bool {
    session.expires_at <= now
}

/// Calculate session expiry from creation time and TTL.
///
/// Returns `None` when the result falls outside the representable range.
pub fn calculate_expiry(created_at: DateTime<Utc>, ttl: Duration) -> Option<DateTime<Utc>> {
    created_at.checked_add_signed(ttl)
}

/// Instant after which an authorization attempt can no longer be redeemed.
pub fn params_expires_at(params: &Params) -> DateTime<Utc> {
    params.created_at + Duration::seconds(PARAMS_TTL_SECS)
}

/// Check if authorization parameters are past their TTL.
pub fn is_params_expired(params: &Params, now: DateTime<Utc>) -> bool {
    params_expires_at(params) <= now
}

/// Pick a display name for a newly created user.
pub fn display_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => "User".to_string(),
    }
}
