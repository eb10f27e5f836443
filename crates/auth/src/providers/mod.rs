//! Identity provider composition and implementations.
//!
//! Providers are assembled explicitly into a [`ProviderSet`]; nothing
//! registers itself. Each entry is tagged with its capability so that a
//! provider which can only build authorization URLs is never asked to
//! redeem a code.
//!
//! Implementations:
//! - [`OidcProvider`]: any issuer supporting OIDC discovery (Google et al.)
//! - [`MockProvider`]: local mock IdP (with `mock` feature)

#[cfg(feature = "mock")]
mod mock;
mod oidc;

use std::collections::HashMap;
use std::sync::Arc;

use sessiongate_core::auth::{AuthError, AuthorizationProvider, LoginProvider, ProviderId, Result};

#[cfg(feature = "mock")]
pub use mock::{MockCode, MockProvider};
pub use oidc::OidcProvider;

/// A configured provider together with what it can do.
#[derive(Clone)]
pub enum ProviderEntry {
    /// Can build authorization URLs only.
    AuthorizeOnly(Arc<dyn AuthorizationProvider>),
    /// Can build authorization URLs and exchange codes.
    Login(Arc<dyn LoginProvider>),
}

impl ProviderEntry {
    pub fn provider_id(&self) -> &ProviderId {
        self.authorizer().provider_id()
    }

    pub fn authorizer(&self) -> &dyn AuthorizationProvider {
        match self {
            ProviderEntry::AuthorizeOnly(p) => p.as_ref(),
            ProviderEntry::Login(p) => p.as_ref(),
        }
    }

    pub fn login(&self) -> Option<&dyn LoginProvider> {
        match self {
            ProviderEntry::AuthorizeOnly(_) => None,
            ProviderEntry::Login(p) => Some(p.as_ref()),
        }
    }
}

/// The configured providers, keyed by id.
#[derive(Clone, Default)]
pub struct ProviderSet {
    entries: HashMap<ProviderId, ProviderEntry>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a provider.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a provider with the same id is already present.
    pub fn insert(&mut self, entry: ProviderEntry) -> Result<()> {
        let id = entry.provider_id().clone();
        if self.entries.contains_key(&id) {
            return Err(AuthError::Configuration(format!(
                "provider '{}' configured twice",
                id
            )));
        }
        self.entries.insert(id, entry);
        Ok(())
    }

    /// Adds a login-capable provider.
    pub fn with_login(mut self, provider: Arc<dyn LoginProvider>) -> Result<Self> {
        self.insert(ProviderEntry::Login(provider))?;
        Ok(self)
    }

    /// Adds a provider that only builds authorization URLs.
    pub fn with_authorize_only(
        mut self,
        provider: Arc<dyn AuthorizationProvider>,
    ) -> Result<Self> {
        self.insert(ProviderEntry::AuthorizeOnly(provider))?;
        Ok(self)
    }

    /// Looks up the URL-building capability of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the provider is not configured.
    pub fn authorizer(&self, id: &ProviderId) -> Result<&dyn AuthorizationProvider> {
        self.entries
            .get(id)
            .map(ProviderEntry::authorizer)
            .ok_or_else(|| not_configured(id))
    }

    /// Looks up the code-exchange capability of `id`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the provider is not configured or cannot
    /// exchange codes.
    pub fn login(&self, id: &ProviderId) -> Result<&dyn LoginProvider> {
        let entry = self.entries.get(id).ok_or_else(|| not_configured(id))?;
        entry.login().ok_or_else(|| {
            AuthError::Configuration(format!("provider '{}' does not support login", id))
        })
    }

    /// Ids of all configured providers, sorted.
    pub fn ids(&self) -> Vec<&ProviderId> {
        let mut ids: Vec<_> = self.entries.keys().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn not_configured(id: &ProviderId) -> AuthError {
    AuthError::Configuration(format!("provider '{}' is not configured", id))
}
