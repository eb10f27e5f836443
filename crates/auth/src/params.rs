//! Authorization request generation.

use std::sync::Arc;

use sessiongate_core::auth::{
    code_challenge_s256, generate_code_verifier, generate_url_safe_token, AuthError,
    AuthorizationRequest, Clock, Params, ParamsRepository, ProviderId, Result,
};

use crate::providers::ProviderSet;

/// Starts login attempts: mints `state`, `nonce` and a PKCE verifier,
/// persists them, and hands back the provider URL to redirect to.
pub struct ParamsGenerator {
    providers: Arc<ProviderSet>,
    params: Arc<dyn ParamsRepository>,
    clock: Arc<dyn Clock>,
}

impl ParamsGenerator {
    pub fn new(
        providers: Arc<ProviderSet>,
        params: Arc<dyn ParamsRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            providers,
            params,
            clock,
        }
    }

    /// Begins an authorization attempt with `provider`.
    ///
    /// Exactly one params record is written per successful call. Nothing is
    /// returned unless that write succeeded.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the provider is unknown
    /// - `Internal` if the URL cannot be built or the params cannot be saved
    #[tracing::instrument(name = "generate", skip_all, fields(provider = %provider))]
    pub async fn generate(&self, provider: &ProviderId) -> Result<AuthorizationRequest> {
        let authorizer = self.providers.authorizer(provider)?;

        let params = Params {
            provider: provider.clone(),
            state: generate_url_safe_token(),
            nonce: generate_url_safe_token(),
            code_verifier: generate_code_verifier(),
            created_at: self.clock.now(),
        };
        let code_challenge = code_challenge_s256(&params.code_verifier);

        let authorization_url = authorizer
            .authorization_url(&params.state, &params.nonce, &code_challenge)
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to build authorization URL");
                AuthError::Internal(e.to_string())
            })?;

        self.params.save(&params).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to persist authorization params");
            AuthError::from(e)
        })?;

        tracing::debug!("Authorization params issued");

        Ok(AuthorizationRequest {
            authorization_url,
            state: params.state,
        })
    }
}
