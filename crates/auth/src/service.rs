//! The four caller-facing operations behind one handle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use sessiongate_core::auth::{
    AuthError as CoreError, AuthorizationRequest, Clock, ProviderId, Result, UserId,
};
use tokio::time::Instant;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::login::LoginOrchestrator;
use crate::logout::Revoker;
use crate::params::ParamsGenerator;
use crate::providers::{OidcProvider, ProviderSet};
use crate::stores::Repositories;
use crate::token::TokenCodec;
use crate::validator::SessionValidator;

#[cfg(feature = "mock")]
use crate::providers::MockProvider;

/// Runs `operation`, abandoning it once `deadline` passes.
///
/// Dropping the operation cancels any in-flight store or provider call. The
/// caller sees `Internal` with a cancellation message.
pub async fn with_deadline<F, T>(deadline: Instant, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, operation).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!("Operation cancelled at deadline");
            Err(CoreError::cancelled())
        }
    }
}

/// Shared handle to the login engine.
///
/// Each operation is bounded by the configured operation timeout.
#[derive(Clone)]
pub struct AuthService {
    providers: Arc<ProviderSet>,
    generator: Arc<ParamsGenerator>,
    orchestrator: Arc<LoginOrchestrator>,
    validator: Arc<SessionValidator>,
    revoker: Arc<Revoker>,
    operation_timeout: Duration,
}

impl AuthService {
    /// Wires the components over already-built providers and stores.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the token secret is too weak or the session TTL
    /// does not fit a timestamp.
    pub fn new(
        config: &AuthConfig,
        providers: ProviderSet,
        repos: Repositories,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, AuthError> {
        let codec = Arc::new(
            TokenCodec::new(
                config.token_secret.as_bytes(),
                config.token_issuer.clone(),
                clock.clone(),
            )
            .map_err(|e| AuthError::Config(e.to_string()))?,
        );
        let session_ttl = chrono::Duration::from_std(config.session_ttl)
            .map_err(|e| AuthError::Config(format!("session TTL out of range: {}", e)))?;
        let providers = Arc::new(providers);

        Ok(Self {
            generator: Arc::new(ParamsGenerator::new(
                providers.clone(),
                repos.params.clone(),
                clock.clone(),
            )),
            orchestrator: Arc::new(LoginOrchestrator::new(
                providers.clone(),
                repos.clone(),
                codec.clone(),
                clock.clone(),
                session_ttl,
            )),
            validator: Arc::new(SessionValidator::new(
                codec.clone(),
                repos.sessions.clone(),
                clock,
            )),
            revoker: Arc::new(Revoker::new(codec, repos.sessions)),
            providers,
            operation_timeout: config.operation_timeout,
        })
    }

    /// Discovers every configured provider, then wires the components.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails for any provider (e.g., the
    /// issuer is unreachable) or if [`Self::new`] fails.
    pub async fn from_config(
        config: &AuthConfig,
        repos: Repositories,
        clock: Arc<dyn Clock>,
    ) -> std::result::Result<Self, AuthError> {
        let mut providers = ProviderSet::new();

        for provider in &config.providers {
            let oidc = OidcProvider::discover(provider).await?;
            providers = providers.with_login(Arc::new(oidc))?;
        }

        #[cfg(feature = "mock")]
        if let Some(mock_idp_url) = &config.mock_idp_url {
            let id = ProviderId::parse("mock")?;
            let redirect_uri = config.callback_url(&id)?;
            tracing::info!(mock_idp = %mock_idp_url, "Mock provider enabled");
            providers = providers.with_login(Arc::new(MockProvider::new(
                id,
                mock_idp_url.clone(),
                redirect_uri,
            )))?;
        }

        if providers.is_empty() {
            tracing::warn!("No identity providers configured");
        }

        Self::new(config, providers, repos, clock)
    }

    pub fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// See [`ParamsGenerator::generate`].
    pub async fn generate(&self, provider: &ProviderId) -> Result<AuthorizationRequest> {
        self.bounded(self.generator.generate(provider)).await
    }

    /// See [`LoginOrchestrator::login`].
    pub async fn login(&self, provider: &ProviderId, code: &str, state: &str) -> Result<String> {
        self.bounded(self.orchestrator.login(provider, code, state)).await
    }

    /// See [`SessionValidator::validate`].
    pub async fn validate(&self, token: &str) -> Result<UserId> {
        self.bounded(self.validator.validate(token)).await
    }

    /// See [`Revoker::logout`].
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.bounded(self.revoker.logout(token)).await
    }

    /// Applies the operation timeout. A timeout too large to express as an
    /// instant leaves the operation unbounded.
    async fn bounded<F, T>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match Instant::now().checked_add(self.operation_timeout) {
            Some(deadline) => with_deadline(deadline, operation).await,
            None => operation.await,
        }
    }
}

/// Allows AuthService to be extracted from a parent state.
impl<S> FromRef<S> for AuthService
where
    S: AsRef<AuthService>,
{
    fn from_ref(state: &S) -> Self {
        state.as_ref().clone()
    }
}
