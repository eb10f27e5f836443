//! Mock OIDC provider for development and testing.
//!
//! This module provides a mock implementation of `LoginProvider` that works
//! with the Mock IdP server for local development.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sessiongate_core::auth::{
    code_challenge_s256, constant_time_eq, AuthorizationProvider, LoginProvider, ProviderClaims,
    ProviderError, ProviderId, ProviderResult,
};
use url::Url;

/// Contents of a mock authorization code.
///
/// The Mock IdP encodes this as base64url JSON; the code therefore carries
/// everything the exchange needs, including the PKCE challenge it was
/// issued against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockCode {
    pub sub: String,
    pub name: Option<String>,
    pub nonce: String,
    pub code_challenge: String,
}

impl MockCode {
    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    pub fn decode(code: &str) -> ProviderResult<Self> {
        let decoded = URL_SAFE_NO_PAD
            .decode(code)
            .map_err(|e| ProviderError::Exchange(e.to_string()))?;

        serde_json::from_slice(&decoded).map_err(|e| ProviderError::Exchange(e.to_string()))
    }
}

/// Mock OIDC provider that works with MockIdpServer.
///
/// This provider generates authorization URLs that point to the Mock IdP server
/// and decodes mock authorization codes that contain embedded user info.
pub struct MockProvider {
    id: ProviderId,
    mock_idp_url: Url,
    redirect_uri: Url,
}

impl MockProvider {
    /// Create a new MockProvider.
    ///
    /// # Arguments
    /// * `id` - The provider id to register under (typically `mock`)
    /// * `mock_idp_url` - The URL of the Mock IdP server (e.g., http://localhost:3001)
    /// * `redirect_uri` - The callback URL for the main app
    pub fn new(id: ProviderId, mock_idp_url: Url, redirect_uri: Url) -> Self {
        Self {
            id,
            mock_idp_url,
            redirect_uri,
        }
    }
}

impl AuthorizationProvider for MockProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    fn authorization_url(
        &self,
        state: &str,
        nonce: &str,
        code_challenge: &str,
    ) -> ProviderResult<Url> {
        let mut url = self
            .mock_idp_url
            .join("/authorize")
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        url.query_pairs_mut()
            .append_pair("provider", self.id.as_str())
            .append_pair("state", state)
            .append_pair("nonce", nonce)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("redirect_uri", self.redirect_uri.as_str());

        Ok(url)
    }
}

#[async_trait]
impl LoginProvider for MockProvider {
    async fn exchange_token(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> ProviderResult<ProviderClaims> {
        let mock = MockCode::decode(code)?;

        if !constant_time_eq(&code_challenge_s256(code_verifier), &mock.code_challenge) {
            return Err(ProviderError::Exchange(
                "PKCE verification failed".to_string(),
            ));
        }

        Ok(ProviderClaims {
            subject: mock.sub,
            name: mock.name,
            nonce: Some(mock.nonce),
        })
    }
}
