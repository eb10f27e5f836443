use std::time::Duration;

use sessiongate_core::auth::ProviderId;
use url::Url;

use crate::error::AuthError;

const GOOGLE_ISSUER: &str = "https://accounts.google.com";
const DEFAULT_SCOPES: &[&str] = &["openid", "email", "profile"];
const SECS_PER_DAY: u64 = 24 * 60 * 60;
const DEFAULT_SESSION_TTL_DAYS: u64 = 7;
const MAX_SESSION_TTL_DAYS: u64 = 365;
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 10;
const MAX_OPERATION_TIMEOUT_SECS: u64 = 60 * 60;

/// Configuration for a single OIDC provider.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub id: ProviderId,
    pub issuer_url: Url,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: Url,
    pub scopes: Vec<String>,
}

/// Complete auth configuration.
#[derive(Clone)]
pub struct AuthConfig {
    pub providers: Vec<ProviderConfig>,
    pub session_ttl: Duration,
    pub token_secret: String,
    pub token_issuer: String,
    pub operation_timeout: Duration,
    pub base_url: Url,
    /// Where the mock IdP listens; enables the `mock` provider when set.
    #[cfg(feature = "mock")]
    pub mock_idp_url: Option<Url>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("providers", &self.providers)
            .field("session_ttl", &self.session_ttl)
            .field("token_secret", &"<redacted>")
            .field("token_issuer", &self.token_issuer)
            .field("operation_timeout", &self.operation_timeout)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl AuthConfig {
    /// Load from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `AUTH_BASE_URL`: Base URL for callback redirects (default: `http://localhost:3000`)
    /// - `SESSION_SECRET`: HS256 signing secret, at least 32 bytes (required)
    /// - `SESSION_TTL_DAYS`: Session TTL in days, at most 365 (default: 7)
    /// - `TOKEN_ISSUER`: `iss` claim of minted tokens (default: `sessiongate`)
    /// - `AUTH_OPERATION_TIMEOUT_SECS`: Per-operation deadline, at most 3600 (default: 10)
    /// - `GOOGLE_CLIENT_ID`: Google OAuth client ID (optional, enables Google auth)
    /// - `GOOGLE_CLIENT_SECRET`: Google OAuth client secret (required if Google enabled)
    /// - `OIDC_PROVIDER_ID`: Id of an additional discovery-based provider (optional)
    /// - `OIDC_ISSUER_URL`, `OIDC_CLIENT_ID`: Required if `OIDC_PROVIDER_ID` is set
    /// - `OIDC_CLIENT_SECRET`: Optional; omit for public clients
    /// - `OIDC_SCOPES`: Space-separated scopes (default: `openid email profile`)
    /// - `MOCK_IDP_URL`: Mock IdP base URL (`mock` feature only)
    ///
    /// # Errors
    ///
    /// Returns `Config` if a value is malformed or a provider is partially
    /// configured (e.g., client ID without secret).
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. See [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key).ok_or_else(|| AuthError::Config(format!("{} must be set", key)))
        };

        let base_url: Url = lookup("AUTH_BASE_URL")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .parse()
            .map_err(|e| AuthError::Config(format!("AUTH_BASE_URL must be a valid URL: {}", e)))?;

        let token_secret = require("SESSION_SECRET")?;
        if token_secret.len() < crate::token::TokenCodec::MIN_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "SESSION_SECRET must be at least {} bytes",
                crate::token::TokenCodec::MIN_SECRET_LEN
            )));
        }

        let mut providers = Vec::new();

        if let Some(client_id) = lookup("GOOGLE_CLIENT_ID") {
            let id = ProviderId::parse("google")?;
            providers.push(ProviderConfig {
                redirect_uri: callback_url(&base_url, &id)?,
                id,
                issuer_url: Url::parse(GOOGLE_ISSUER)
                    .map_err(|e| AuthError::Config(e.to_string()))?,
                client_id,
                client_secret: Some(require("GOOGLE_CLIENT_SECRET")?),
                scopes: default_scopes(),
            });
        }

        if let Some(provider_id) = lookup("OIDC_PROVIDER_ID") {
            let id = ProviderId::parse(&provider_id)
                .map_err(|e| AuthError::Config(format!("OIDC_PROVIDER_ID: {}", e)))?;
            let issuer_url = require("OIDC_ISSUER_URL")?
                .parse()
                .map_err(|e| AuthError::Config(format!("OIDC_ISSUER_URL: {}", e)))?;
            let scopes = lookup("OIDC_SCOPES")
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or_else(default_scopes);

            providers.push(ProviderConfig {
                redirect_uri: callback_url(&base_url, &id)?,
                id,
                issuer_url,
                client_id: require("OIDC_CLIENT_ID")?,
                client_secret: lookup("OIDC_CLIENT_SECRET"),
                scopes,
            });
        }

        for (i, provider) in providers.iter().enumerate() {
            if providers[..i].iter().any(|p| p.id == provider.id) {
                return Err(AuthError::Config(format!(
                    "provider '{}' configured twice",
                    provider.id
                )));
            }
        }

        let session_ttl_days = bounded_number(
            &lookup,
            "SESSION_TTL_DAYS",
            DEFAULT_SESSION_TTL_DAYS,
            MAX_SESSION_TTL_DAYS,
        )?;
        let session_ttl = session_ttl_days
            .checked_mul(SECS_PER_DAY)
            .map(Duration::from_secs)
            .ok_or_else(|| AuthError::Config("SESSION_TTL_DAYS is out of range".to_string()))?;

        let operation_timeout = Duration::from_secs(bounded_number(
            &lookup,
            "AUTH_OPERATION_TIMEOUT_SECS",
            DEFAULT_OPERATION_TIMEOUT_SECS,
            MAX_OPERATION_TIMEOUT_SECS,
        )?);

        #[cfg(feature = "mock")]
        let mock_idp_url = lookup("MOCK_IDP_URL")
            .map(|u| u.parse())
            .transpose()
            .map_err(|e| AuthError::Config(format!("MOCK_IDP_URL: {}", e)))?;

        Ok(Self {
            providers,
            session_ttl,
            token_secret,
            token_issuer: lookup("TOKEN_ISSUER").unwrap_or_else(|| "sessiongate".to_string()),
            operation_timeout,
            base_url,
            #[cfg(feature = "mock")]
            mock_idp_url,
        })
    }

    /// Callback URL for `provider` under this configuration's base URL.
    pub fn callback_url(&self, provider: &ProviderId) -> Result<Url, AuthError> {
        callback_url(&self.base_url, provider)
    }
}

fn callback_url(base_url: &Url, provider: &ProviderId) -> Result<Url, AuthError> {
    base_url
        .join(&format!("/auth/{}/callback", provider))
        .map_err(|e| AuthError::Config(e.to_string()))
}

/// Reads `key` as a number in `1..=max`, or `default` when unset.
fn bounded_number<F>(lookup: &F, key: &str, default: u64, max: u64) -> Result<u64, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|_| AuthError::Config(format!("{} must be a number", key)))?;
    if value == 0 || value > max {
        return Err(AuthError::Config(format!(
            "{} must be between 1 and {}",
            key, max
        )));
    }
    Ok(value)
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
}
