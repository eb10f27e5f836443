use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{calculate_expiry, generate_session_id, AuthError};

/// Cryptographically random session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Internal user identifier (UUIDv7, so identifiers sort by creation time).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a configured identity provider, e.g. `google`.
///
/// Restricted to lowercase ASCII letters, digits, `-` and `_` (at most 32
/// characters) so it can be embedded in URL paths and storage keys as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProviderId(String);

impl ProviderId {
    pub const MAX_LEN: usize = 32;

    /// Parses and validates a provider identifier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the identifier is empty, too long or
    /// contains characters outside `[a-z0-9_-]`.
    pub fn parse(id: &str) -> Result<Self, AuthError> {
        if id.is_empty() || id.len() > Self::MAX_LEN {
            return Err(AuthError::InvalidRequest(format!(
                "provider id must be 1-{} characters",
                Self::MAX_LEN
            )));
        }

        let valid = id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');
        if !valid {
            return Err(AuthError::InvalidRequest(
                "provider id contains invalid characters".to_string(),
            ));
        }

        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProviderId {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProviderId {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProviderId> for String {
    fn from(value: ProviderId) -> Self {
        value.0
    }
}

/// Per-attempt anti-replay material, keyed by `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    pub provider: ProviderId,
    pub state: String,
    pub nonce: String,
    pub code_verifier: String,
    pub created_at: DateTime<Utc>,
}

/// Internal user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new_v7(),
            name: name.into(),
            created_at,
        }
    }
}

/// Binding between an external provider subject and an internal user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: UserId,
    pub provider: ProviderId,
    pub subject: String,
    pub created_at: DateTime<Utc>,
}

/// Authenticated user session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Starts a new session for `user_id` lasting `ttl` from `created_at`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if `ttl` is not positive, since the session
    /// would be expired from the moment it is created, or if the expiry does
    /// not fit a timestamp.
    pub fn start(
        user_id: UserId,
        created_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<Self, AuthError> {
        if ttl <= Duration::zero() {
            return Err(AuthError::Configuration(
                "session duration must be positive".to_string(),
            ));
        }

        let expires_at = calculate_expiry(created_at, ttl).ok_or_else(|| {
            AuthError::Configuration("session expiry is out of range".to_string())
        })?;

        Ok(Self {
            id: generate_session_id(),
            user_id,
            created_at,
            expires_at,
        })
    }
}

/// Claims returned by a provider after a successful code exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClaims {
    /// Provider's unique user identifier.
    pub subject: String,
    /// User's display name, when the provider shares it.
    pub name: Option<String>,
    /// Nonce embedded in the ID token.
    pub nonce: Option<String>,
}

/// Result of starting an authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub authorization_url: Url,
    pub state: String,
}
