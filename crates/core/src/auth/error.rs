use thiserror::Error;

/// Errors surfaced by the authentication engine to its callers.
///
/// Transport layers map these to protocol-specific status codes. Several
/// underlying causes intentionally collapse into `Unauthenticated` so that
/// callers cannot tell a bad token from a revoked or expired session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid OIDC state parameter")]
    InvalidState,

    #[error("failed to exchange authorization code: {0}")]
    InvalidCode(String),

    #[error("ID token nonce does not match the authorization attempt")]
    InvalidNonce,

    #[error("identity is already bound to another user")]
    IdentityConflict,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Error returned when an operation is abandoned because its deadline passed.
    pub fn cancelled() -> Self {
        Self::Internal("operation cancelled: deadline exceeded".to_string())
    }

    /// Whether the failure was caused by the caller's input rather than by
    /// the system. Protocol rejections are terminal for the attempt.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_) | Self::Configuration(_))
    }
}

/// Errors reported by store implementations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity_type} already exists: {id}")]
    AlreadyExists {
        entity_type: &'static str,
        id: String,
    },

    #[error("{entity_type} is already expired: {id}")]
    Expired {
        entity_type: &'static str,
        id: String,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

/// Errors reported by identity provider adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider configuration error: {0}")]
    Configuration(String),

    #[error("code exchange failed: {0}")]
    Exchange(String),

    #[error("invalid ID token: {0}")]
    InvalidIdToken(String),
}
