//! Discovery-based OIDC provider (Google and any compliant issuer).

use async_trait::async_trait;
use openidconnect::{
    core::{CoreAuthenticationFlow, CoreClient, CoreProviderMetadata},
    reqwest, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointMaybeSet, EndpointSet,
    IssuerUrl, Nonce, PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use sessiongate_core::auth::{
    AuthorizationProvider, LoginProvider, ProviderClaims, ProviderError, ProviderId,
    ProviderResult,
};
use url::Url;

use crate::config::ProviderConfig;

/// Type alias for a CoreClient configured from provider metadata.
///
/// `from_provider_metadata` returns a client with:
/// - HasAuthUrl = EndpointSet (always set from discovery)
/// - HasDeviceAuthUrl = EndpointNotSet
/// - HasIntrospectionUrl = EndpointNotSet
/// - HasRevocationUrl = EndpointNotSet
/// - HasTokenUrl = EndpointMaybeSet (may or may not be in discovery)
/// - HasUserInfoUrl = EndpointMaybeSet (may or may not be in discovery)
///
/// Calling `set_redirect_uri` preserves these type parameters.
type ConfiguredCoreClient = CoreClient<
    EndpointSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    openidconnect::EndpointNotSet,
    EndpointMaybeSet,
    EndpointMaybeSet,
>;

/// OIDC provider configured through discovery.
pub struct OidcProvider {
    id: ProviderId,
    client: ConfiguredCoreClient,
    http_client: reqwest::Client,
    scopes: Vec<String>,
}

impl OidcProvider {
    /// Create a provider by discovering the issuer's OIDC metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The issuer URL is invalid
    /// - Discovery fails (network error or invalid metadata)
    /// - The redirect URI is invalid
    pub async fn discover(config: &ProviderConfig) -> ProviderResult<Self> {
        let issuer_url = IssuerUrl::new(issuer_string(&config.issuer_url))
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        // Build HTTP client without redirect following (security requirement)
        let http_client = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http_client)
            .await
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        let client = CoreClient::from_provider_metadata(
            provider_metadata,
            ClientId::new(config.client_id.clone()),
            config.client_secret.clone().map(ClientSecret::new),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.to_string())
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
        );

        tracing::info!(
            provider = %config.id,
            issuer = %config.issuer_url,
            "Discovered OIDC provider"
        );

        Ok(Self {
            id: config.id.clone(),
            client,
            http_client,
            // `openid` is always requested by the authorization request itself.
            scopes: config
                .scopes
                .iter()
                .filter(|s| s.as_str() != "openid")
                .cloned()
                .collect(),
        })
    }
}

/// Issuer identifiers are compared verbatim, so drop the trailing slash
/// `Url` adds to bare origins.
fn issuer_string(url: &Url) -> String {
    let s = url.as_str();
    if url.path() == "/" && url.query().is_none() {
        s.trim_end_matches('/').to_string()
    } else {
        s.to_string()
    }
}

impl AuthorizationProvider for OidcProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    fn authorization_url(
        &self,
        state: &str,
        nonce: &str,
        code_challenge: &str,
    ) -> ProviderResult<Url> {
        // The closures must be 'static, so hand them owned copies.
        let state_owned = state.to_string();
        let nonce_owned = nonce.to_string();

        // Use add_extra_param to pass the pre-computed PKCE challenge directly.
        let mut request = self.client.authorize_url(
            CoreAuthenticationFlow::AuthorizationCode,
            move || CsrfToken::new(state_owned),
            move || Nonce::new(nonce_owned),
        );
        for scope in &self.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, _csrf_token, _nonce) = request
            .add_extra_param("code_challenge", code_challenge.to_string())
            .add_extra_param("code_challenge_method", "S256")
            .url();

        Ok(auth_url)
    }
}

#[async_trait]
impl LoginProvider for OidcProvider {
    async fn exchange_token(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> ProviderResult<ProviderClaims> {
        let token_response = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .map_err(|e| ProviderError::Configuration(e.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(code_verifier.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| ProviderError::Exchange(e.to_string()))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| ProviderError::InvalidIdToken("No ID token in response".to_string()))?;

        // Signature, issuer, audience and expiry are verified here; the nonce
        // is returned to the caller, which owns the expected value.
        let claims = id_token
            .claims(
                &self.client.id_token_verifier(),
                |_: Option<&Nonce>| -> Result<(), String> { Ok(()) },
            )
            .map_err(|e| ProviderError::InvalidIdToken(e.to_string()))?;

        Ok(ProviderClaims {
            subject: claims.subject().to_string(),
            name: claims
                .name()
                .and_then(|n| n.get(None))
                .map(|n| n.to_string()),
            nonce: claims.nonce().map(|n| n.secret().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issuer_string_drops_trailing_slash_on_origin() {
        let url = Url::parse("https://accounts.google.com").unwrap();
        assert_eq!(issuer_string(&url), "https://accounts.google.com");
    }

    #[test]
    fn issuer_string_keeps_paths() {
        let url = Url::parse("https://sso.example.com/realms/main").unwrap();
        assert_eq!(issuer_string(&url), "https://sso.example.com/realms/main");
    }
}
