use async_trait::async_trait;
use url::Url;

use super::{
    Identity, Params, ProviderClaims, ProviderError, ProviderId, Session, SessionId, StoreError,
    User, UserId,
};

/// Result type for auth operations.
pub type Result<T> = std::result::Result<T, super::AuthError>;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// An identity provider that can send users to its authorization endpoint.
pub trait AuthorizationProvider: Send + Sync {
    /// Which provider this client represents.
    fn provider_id(&self) -> &ProviderId;

    /// Build the authorization URL for user redirect.
    ///
    /// The URL must carry `state`, `nonce`, `code_challenge` and
    /// `code_challenge_method=S256` alongside the client's own parameters.
    fn authorization_url(
        &self,
        state: &str,
        nonce: &str,
        code_challenge: &str,
    ) -> ProviderResult<Url>;
}

/// An identity provider that can also redeem authorization codes.
#[async_trait]
pub trait LoginProvider: AuthorizationProvider {
    /// Exchange an authorization code (plus PKCE verifier) for identity claims.
    ///
    /// Implementations verify the ID token's signature, issuer and audience
    /// but leave nonce comparison to the caller.
    async fn exchange_token(&self, code: &str, code_verifier: &str)
        -> ProviderResult<ProviderClaims>;
}

/// Storage for in-flight authorization attempts.
#[async_trait]
pub trait ParamsRepository: Send + Sync {
    /// Store parameters keyed by their `state`. Fails if already past TTL.
    async fn save(&self, params: &Params) -> StoreResult<()>;

    /// Retrieve unexpired parameters without consuming them.
    async fn get_by_state(&self, state: &str) -> StoreResult<Option<Params>>;

    /// Retrieve and delete parameters in one atomic step.
    async fn take_by_state(&self, state: &str) -> StoreResult<Option<Params>>;
}

/// Session storage abstraction.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Store a new session. Fails if the session is already expired.
    async fn save(&self, session: &Session) -> StoreResult<()>;

    /// Retrieve session by ID.
    async fn get(&self, id: &SessionId) -> StoreResult<Option<Session>>;

    /// Delete a specific session. Deleting a missing session is not an error.
    async fn delete(&self, id: &SessionId) -> StoreResult<()>;
}

/// User storage abstraction.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save(&self, user: &User) -> StoreResult<()>;

    async fn get_by_id(&self, id: UserId) -> StoreResult<Option<User>>;
}

/// Storage for provider-subject bindings.
#[async_trait]
pub trait IdentityRepository: Send + Sync {
    /// Atomically insert a binding.
    ///
    /// Returns `StoreError::AlreadyExists` if `(provider, subject)` is
    /// already bound to a different user. Re-saving an identical binding
    /// succeeds.
    async fn save(&self, identity: &Identity) -> StoreResult<()>;

    async fn get_by_provider_subject(
        &self,
        provider: &ProviderId,
        subject: &str,
    ) -> StoreResult<Option<Identity>>;
}
