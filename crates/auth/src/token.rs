//! Signed session tokens.
//!
//! A session token is an HS256 JWT minted from a persisted [`Session`]. It
//! can be checked for integrity and expiry without a store round-trip, but
//! callers still have to look the session up to honour revocation.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sessiongate_core::auth::{AuthError, Clock, Session, SessionId, User, UserId};
use thiserror::Error;

/// Errors produced while minting or verifying session tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("signing secret must be at least {min} bytes")]
    WeakSecret { min: usize },

    #[error("session {session_id} does not belong to user {user_id}")]
    UserMismatch { session_id: String, user_id: String },

    #[error("failed to sign token: {0}")]
    Encode(String),

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,

    #[error("token does not carry a session id")]
    MissingSessionId,

    #[error("token subject is not a user id")]
    InvalidSubject,
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::WeakSecret { .. } => AuthError::Configuration(err.to_string()),
            TokenError::UserMismatch { .. } | TokenError::Encode(_) => {
                AuthError::Internal(err.to_string())
            }
            TokenError::Invalid(_)
            | TokenError::Expired
            | TokenError::MissingSessionId
            | TokenError::InvalidSubject => AuthError::Unauthenticated,
        }
    }
}

/// Wire representation of the token payload.
#[derive(Debug, Serialize, Deserialize)]
struct SessionTokenClaims {
    sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    iat: i64,
    exp: i64,
    iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

/// Claims of a token whose signature (and, unless explicitly skipped,
/// expiry) has been verified.
///
/// Only [`TokenCodec`] can construct this type, so holding one is proof
/// that verification happened.
#[derive(Debug, Clone)]
pub struct VerifiedClaims {
    claims: SessionTokenClaimsView,
}

#[derive(Debug, Clone)]
struct SessionTokenClaimsView {
    subject: String,
    session_id: Option<String>,
    issued_at: i64,
    expires_at: i64,
    name: Option<String>,
}

impl VerifiedClaims {
    /// The session this token was minted for.
    ///
    /// # Errors
    ///
    /// Returns `MissingSessionId` if the claim is absent or empty.
    pub fn session_id(&self) -> Result<SessionId, TokenError> {
        match self.claims.session_id.as_deref() {
            Some(sid) if !sid.is_empty() => Ok(SessionId::new(sid.to_string())),
            _ => Err(TokenError::MissingSessionId),
        }
    }

    pub fn subject(&self) -> &str {
        &self.claims.subject
    }

    /// The subject parsed as an internal user id.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.claims
            .subject
            .parse()
            .map_err(|_| TokenError::InvalidSubject)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.claims.issued_at, 0).single()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.claims.expires_at, 0).single()
    }

    /// Display attribute embedded at issuance.
    pub fn name(&self) -> Option<&str> {
        self.claims.name.as_deref()
    }
}

/// Mints and verifies session tokens with a shared HS256 secret.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    clock: Arc<dyn Clock>,
}

impl TokenCodec {
    /// Minimum accepted secret length, matching the HS256 output size.
    pub const MIN_SECRET_LEN: usize = 32;

    /// Creates a codec for `issuer` signing with `secret`.
    ///
    /// # Errors
    ///
    /// Returns `WeakSecret` if the secret is shorter than [`Self::MIN_SECRET_LEN`].
    pub fn new(
        secret: &[u8],
        issuer: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, TokenError> {
        if secret.len() < Self::MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret {
                min: Self::MIN_SECRET_LEN,
            });
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
            clock,
        })
    }

    /// Mints a token for `session`, owned by `user`.
    pub fn generate(&self, session: &Session, user: &User) -> Result<String, TokenError> {
        if session.user_id != user.id {
            return Err(TokenError::UserMismatch {
                session_id: session.id.to_string(),
                user_id: user.id.to_string(),
            });
        }

        let claims = SessionTokenClaims {
            sub: user.id.to_string(),
            sid: Some(session.id.to_string()),
            iat: session.created_at.timestamp(),
            exp: session.expires_at.timestamp(),
            iss: self.issuer.clone(),
            name: Some(user.name.clone()),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))
    }

    /// Verifies signature, issuer and expiry.
    ///
    /// A token whose `exp` equals the current second is already expired.
    /// `exp` is the session expiry truncated to whole seconds, so a token
    /// can stop verifying up to a second before its session ends.
    pub fn verify(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        let claims = self.decode_verified(token)?;

        if claims.exp <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(Self::into_verified(claims))
    }

    /// Verifies signature and issuer but accepts expired tokens.
    ///
    /// Only suitable for operations that are harmless on a stale token,
    /// such as logging out.
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<VerifiedClaims, TokenError> {
        self.decode_verified(token).map(Self::into_verified)
    }

    fn decode_verified(&self, token: &str) -> Result<SessionTokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock instead.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        decode::<SessionTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(e.to_string()))
    }

    fn into_verified(claims: SessionTokenClaims) -> VerifiedClaims {
        VerifiedClaims {
            claims: SessionTokenClaimsView {
                subject: claims.sub,
                session_id: claims.sid,
                issued_at: claims.iat,
                expires_at: claims.exp,
                name: claims.name,
            },
        }
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}
