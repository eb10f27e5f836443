//! Completing a login: callback parameters in, session token out.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sessiongate_core::auth::{
    constant_time_eq, display_name, is_params_expired, validate_callback_param, AuthError, Clock,
    Identity, Params, ProviderClaims, ProviderId, Result, Session, StoreError, User,
    MAX_CODE_LEN, MAX_STATE_LEN,
};

use crate::providers::ProviderSet;
use crate::stores::Repositories;
use crate::token::TokenCodec;

/// Steps of a single login call. Each one either advances or ends the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    Received,
    ParamsLookup,
    CodeExchange,
    NonceCheck,
    IdentityResolve,
    SessionIssue,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoginStage::Received => "received",
            LoginStage::ParamsLookup => "params_lookup",
            LoginStage::CodeExchange => "code_exchange",
            LoginStage::NonceCheck => "nonce_check",
            LoginStage::IdentityResolve => "identity_resolve",
            LoginStage::SessionIssue => "session_issue",
        };
        f.write_str(name)
    }
}

fn internal(stage: LoginStage, err: impl fmt::Display) -> AuthError {
    tracing::error!(%stage, error = %err, "Login failed");
    AuthError::Internal(format!("{}: {}", stage, err))
}

/// Redeems a provider callback for a signed session token.
pub struct LoginOrchestrator {
    providers: Arc<ProviderSet>,
    repos: Repositories,
    codec: Arc<TokenCodec>,
    clock: Arc<dyn Clock>,
    session_ttl: Duration,
}

impl LoginOrchestrator {
    pub fn new(
        providers: Arc<ProviderSet>,
        repos: Repositories,
        codec: Arc<TokenCodec>,
        clock: Arc<dyn Clock>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            providers,
            repos,
            codec,
            clock,
            session_ttl,
        }
    }

    /// Completes the login started by a params generator call.
    ///
    /// The params for `state` are consumed on lookup, so a given `state`
    /// can be redeemed at most once, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if `code` or `state` is malformed
    /// - `Configuration` if `provider` is unknown or cannot log in
    /// - `InvalidState` if `state` is unknown, expired, or was issued for
    ///   another provider
    /// - `InvalidCode` if the provider rejects the exchange
    /// - `InvalidNonce` if the returned nonce does not match
    /// - `IdentityConflict` if a concurrent login bound the same subject first
    /// - `Internal` on store failures or if the token cannot be minted
    #[tracing::instrument(name = "login", skip_all, fields(provider = %provider))]
    pub async fn login(&self, provider: &ProviderId, code: &str, state: &str) -> Result<String> {
        let code = validate_callback_param("code", code, MAX_CODE_LEN)?;
        let state = validate_callback_param("state", state, MAX_STATE_LEN)?;
        let gateway = self.providers.login(provider)?;
        tracing::debug!(stage = %LoginStage::Received, "Login callback received");

        let params = self.lookup_params(provider, state).await?;

        let claims = gateway
            .exchange_token(code, &params.code_verifier)
            .await
            .map_err(|e| {
                tracing::warn!(
                    stage = %LoginStage::CodeExchange,
                    error = %e,
                    "Code exchange rejected"
                );
                AuthError::InvalidCode(e.to_string())
            })?;

        check_nonce(&claims, &params)?;

        let now = self.clock.now();
        let user = self.resolve_user(provider, &claims, now).await?;

        let session = Session::start(user.id, now, self.session_ttl)?;
        self.repos
            .sessions
            .save(&session)
            .await
            .map_err(|e| internal(LoginStage::SessionIssue, e))?;

        // On failure the persisted session is left to lapse at its own expiry.
        let token = self.codec.generate(&session, &user).map_err(|e| {
            tracing::warn!(user_id = %user.id, "Orphaned session left behind");
            internal(LoginStage::SessionIssue, e)
        })?;

        tracing::info!(user_id = %user.id, "Login succeeded");
        Ok(token)
    }

    async fn lookup_params(&self, provider: &ProviderId, state: &str) -> Result<Params> {
        let params = self
            .repos
            .params
            .take_by_state(state)
            .await
            .map_err(|e| internal(LoginStage::ParamsLookup, e))?;

        match params {
            Some(params) if is_params_expired(&params, self.clock.now()) => {
                tracing::debug!(stage = %LoginStage::ParamsLookup, "Params expired");
                Err(AuthError::InvalidState)
            }
            Some(params) if &params.provider != provider => {
                tracing::warn!(
                    stage = %LoginStage::ParamsLookup,
                    issued_for = %params.provider,
                    "State presented to the wrong provider"
                );
                Err(AuthError::InvalidState)
            }
            Some(params) => Ok(params),
            None => {
                tracing::debug!(stage = %LoginStage::ParamsLookup, "Unknown state");
                Err(AuthError::InvalidState)
            }
        }
    }

    async fn resolve_user(
        &self,
        provider: &ProviderId,
        claims: &ProviderClaims,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let stage = LoginStage::IdentityResolve;

        let existing = self
            .repos
            .identities
            .get_by_provider_subject(provider, &claims.subject)
            .await
            .map_err(|e| internal(stage, e))?;

        if let Some(identity) = existing {
            return self
                .repos
                .users
                .get_by_id(identity.user_id)
                .await
                .map_err(|e| internal(stage, e))?
                .ok_or_else(|| {
                    internal(
                        stage,
                        format!("identity bound to missing user {}", identity.user_id),
                    )
                });
        }

        let user = User::new(display_name(claims.name.as_deref()), now);
        self.repos
            .users
            .save(&user)
            .await
            .map_err(|e| internal(stage, e))?;

        let identity = Identity {
            user_id: user.id,
            provider: provider.clone(),
            subject: claims.subject.clone(),
            created_at: now,
        };
        match self.repos.identities.save(&identity).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, "Registered new user");
                Ok(user)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::warn!(%stage, "Identity bound concurrently by another login");
                Err(AuthError::IdentityConflict)
            }
            Err(e) => Err(internal(stage, e)),
        }
    }
}

fn check_nonce(claims: &ProviderClaims, params: &Params) -> Result<()> {
    match claims.nonce.as_deref() {
        Some(nonce) if constant_time_eq(nonce, &params.nonce) => Ok(()),
        Some(_) => {
            tracing::warn!(stage = %LoginStage::NonceCheck, "Nonce mismatch");
            Err(AuthError::InvalidNonce)
        }
        None => {
            tracing::warn!(stage = %LoginStage::NonceCheck, "ID token carried no nonce");
            Err(AuthError::InvalidNonce)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamsGenerator;
    use crate::testing::{providers, Fixture, NonceReply, StubProvider, REJECTED_CODE};
    use sessiongate_core::auth::PARAMS_TTL_SECS;

    fn id(s: &str) -> ProviderId {
        ProviderId::parse(s).unwrap()
    }

    struct Flow {
        fx: Fixture,
        generator: ParamsGenerator,
        orchestrator: LoginOrchestrator,
    }

    fn flow(google: StubProvider) -> Flow {
        let fx = Fixture::new();
        let providers = providers(google);
        Flow {
            generator: ParamsGenerator::new(
                providers.clone(),
                fx.repos.params.clone(),
                fx.clock(),
            ),
            orchestrator: LoginOrchestrator::new(
                providers,
                fx.repos.clone(),
                fx.codec.clone(),
                fx.clock(),
                fx.session_ttl,
            ),
            fx,
        }
    }

    #[tokio::test]
    async fn test_first_login_registers_user() {
        let flow = flow(StubProvider::new("google"));
        let request = flow.generator.generate(&id("google")).await.unwrap();

        let token = flow
            .orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap();

        let claims = flow.fx.codec.verify(&token).unwrap();
        let user_id = claims.user_id().unwrap();

        let identity = flow
            .fx
            .repos
            .identities
            .get_by_provider_subject(&id("google"), "sub-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(identity.user_id, user_id);

        let user = flow.fx.repos.users.get_by_id(user_id).await.unwrap().unwrap();
        assert_eq!(user.name, "Ada Lovelace");

        let session = flow
            .fx
            .repos
            .sessions
            .get(&claims.session_id().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, user_id);
        assert_eq!(session.created_at, flow.fx.clock.now());
        assert_eq!(
            session.expires_at,
            flow.fx.clock.now() + flow.fx.session_ttl
        );
    }

    #[tokio::test]
    async fn test_returning_user_keeps_id() {
        let flow = flow(StubProvider::new("google"));

        let first = flow.generator.generate(&id("google")).await.unwrap();
        let token1 = flow
            .orchestrator
            .login(&id("google"), "sub-1", &first.state)
            .await
            .unwrap();

        let second = flow.generator.generate(&id("google")).await.unwrap();
        let token2 = flow
            .orchestrator
            .login(&id("google"), "sub-1", &second.state)
            .await
            .unwrap();

        let a = flow.fx.codec.verify(&token1).unwrap();
        let b = flow.fx.codec.verify(&token2).unwrap();
        assert_eq!(a.user_id().unwrap(), b.user_id().unwrap());
        assert_ne!(a.session_id().unwrap(), b.session_id().unwrap());
    }

    #[tokio::test]
    async fn test_state_is_single_use() {
        let flow = flow(StubProvider::new("google"));
        let request = flow.generator.generate(&id("google")).await.unwrap();

        flow.orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap();
        let replay = flow
            .orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await;

        assert_eq!(replay.unwrap_err(), AuthError::InvalidState);
    }

    #[tokio::test]
    async fn test_unknown_state() {
        let flow = flow(StubProvider::new("google"));
        let err = flow
            .orchestrator
            .login(&id("google"), "sub-1", "never-issued")
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidState);
    }

    #[tokio::test]
    async fn test_expired_state() {
        let flow = flow(StubProvider::new("google"));
        let request = flow.generator.generate(&id("google")).await.unwrap();

        flow.fx.clock.advance(Duration::seconds(PARAMS_TTL_SECS));

        let err = flow
            .orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidState);
    }

    #[tokio::test]
    async fn test_state_issued_for_other_provider() {
        let flow = flow(StubProvider::new("google"));
        let request = flow.generator.generate(&id("partner")).await.unwrap();

        // `partner` cannot log in; route its state through `google` instead.
        let err = flow
            .orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidState);
    }

    #[tokio::test]
    async fn test_authorize_only_provider_cannot_login() {
        let flow = flow(StubProvider::new("google"));
        let request = flow.generator.generate(&id("partner")).await.unwrap();

        let err = flow
            .orchestrator
            .login(&id("partner"), "sub-1", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_rejected_code() {
        let flow = flow(StubProvider::new("google"));
        let request = flow.generator.generate(&id("google")).await.unwrap();

        let err = flow
            .orchestrator
            .login(&id("google"), REJECTED_CODE, &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode(_)));
    }

    #[tokio::test]
    async fn test_nonce_mismatch_creates_nothing() {
        let flow = flow(
            StubProvider::new("google").with_nonce(NonceReply::Replace("forged".to_string())),
        );
        let request = flow.generator.generate(&id("google")).await.unwrap();

        let err = flow
            .orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidNonce);

        assert!(flow.fx.sessions.is_empty().await);
        assert!(flow.fx.users.is_empty().await);
        assert!(flow.fx.identities.is_empty().await);
    }

    #[tokio::test]
    async fn test_session_ttl_past_timestamp_range_is_rejected() {
        let fx = Fixture::new();
        let providers = providers(StubProvider::new("google"));
        let generator =
            ParamsGenerator::new(providers.clone(), fx.repos.params.clone(), fx.clock());
        let orchestrator = LoginOrchestrator::new(
            providers,
            fx.repos.clone(),
            fx.codec.clone(),
            fx.clock(),
            Duration::days(365 * 1_000_000),
        );
        let request = generator.generate(&id("google")).await.unwrap();

        let err = orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Configuration(_)));
        assert!(fx.sessions.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_nonce() {
        let flow = flow(StubProvider::new("google").with_nonce(NonceReply::Omit));
        let request = flow.generator.generate(&id("google")).await.unwrap();

        let err = flow
            .orchestrator
            .login(&id("google"), "sub-1", &request.state)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidNonce);
    }

    #[tokio::test]
    async fn test_malformed_callback_params() {
        let flow = flow(StubProvider::new("google"));

        let empty_code = flow.orchestrator.login(&id("google"), "", "state").await;
        assert!(matches!(empty_code, Err(AuthError::InvalidRequest(_))));

        let long_state = "s".repeat(MAX_STATE_LEN + 1);
        let result = flow
            .orchestrator
            .login(&id("google"), "sub-1", &long_state)
            .await;
        assert!(matches!(result, Err(AuthError::InvalidRequest(_))));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(LoginStage::ParamsLookup.to_string(), "params_lookup");
        assert_eq!(LoginStage::SessionIssue.to_string(), "session_issue");
    }
}
