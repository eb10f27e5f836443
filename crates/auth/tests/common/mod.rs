#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sessiongate_auth::{AuthConfig, AuthService, ProviderSet, Repositories};
use sessiongate_core::auth::{
    code_challenge_s256, AuthorizationProvider, Clock, Identity, IdentityRepository,
    LoginProvider, ManualClock, ProviderClaims, ProviderError, ProviderId, ProviderResult,
    StoreResult,
};
use tokio::sync::Barrier;
use url::Url;

pub const SECRET: &str = "integration-secret-integration-secret";

/// Provider double. The authorization code is used as the subject and the
/// nonce is echoed back for whichever PKCE challenge the verifier matches.
pub struct StubProvider {
    id: ProviderId,
    forged_nonce: Option<String>,
    issued: Mutex<HashMap<String, String>>,
}

impl StubProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::parse(id).unwrap(),
            forged_nonce: None,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn forging_nonce(mut self, nonce: &str) -> Self {
        self.forged_nonce = Some(nonce.to_string());
        self
    }
}

impl AuthorizationProvider for StubProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    fn authorization_url(
        &self,
        state: &str,
        nonce: &str,
        code_challenge: &str,
    ) -> ProviderResult<Url> {
        self.issued
            .lock()
            .unwrap()
            .insert(code_challenge.to_string(), nonce.to_string());

        let mut url = Url::parse("https://accounts.example/o/oauth2/auth").unwrap();
        url.query_pairs_mut()
            .append_pair("state", state)
            .append_pair("nonce", nonce)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");
        Ok(url)
    }
}

#[async_trait]
impl LoginProvider for StubProvider {
    async fn exchange_token(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> ProviderResult<ProviderClaims> {
        let nonce = self
            .issued
            .lock()
            .unwrap()
            .get(&code_challenge_s256(code_verifier))
            .cloned()
            .ok_or_else(|| ProviderError::Exchange("unknown code verifier".to_string()))?;

        Ok(ProviderClaims {
            subject: code.to_string(),
            name: Some("Grace Hopper".to_string()),
            nonce: Some(self.forged_nonce.clone().unwrap_or(nonce)),
        })
    }
}

/// Identity store that holds every lookup until `parties` lookups are in
/// flight, so concurrent first logins all see "no identity yet".
pub struct GatedIdentities {
    inner: Arc<dyn IdentityRepository>,
    barrier: Barrier,
}

impl GatedIdentities {
    pub fn new(inner: Arc<dyn IdentityRepository>, parties: usize) -> Self {
        Self {
            inner,
            barrier: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl IdentityRepository for GatedIdentities {
    async fn save(&self, identity: &Identity) -> StoreResult<()> {
        self.inner.save(identity).await
    }

    async fn get_by_provider_subject(
        &self,
        provider: &ProviderId,
        subject: &str,
    ) -> StoreResult<Option<Identity>> {
        let found = self.inner.get_by_provider_subject(provider, subject).await;
        self.barrier.wait().await;
        found
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 8, 30, 0).unwrap()
}

pub fn config(session_ttl_days: u64) -> AuthConfig {
    let vars: HashMap<&str, String> = [
        ("SESSION_SECRET", SECRET.to_string()),
        ("SESSION_TTL_DAYS", session_ttl_days.to_string()),
        ("TOKEN_ISSUER", "sessiongate-it".to_string()),
    ]
    .into_iter()
    .collect();
    AuthConfig::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

pub struct Harness {
    pub clock: ManualClock,
    pub repos: Repositories,
    pub service: AuthService,
}

impl Harness {
    pub fn new(google: StubProvider) -> Self {
        let clock = ManualClock::new(start_time());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        Self::with_repos(google, clock, Repositories::in_memory(shared))
    }

    pub fn with_repos(google: StubProvider, clock: ManualClock, repos: Repositories) -> Self {
        let providers = ProviderSet::new().with_login(Arc::new(google)).unwrap();
        let service =
            AuthService::new(&config(1), providers, repos.clone(), Arc::new(clock.clone()))
                .unwrap();
        Self {
            clock,
            repos,
            service,
        }
    }

    pub fn google() -> ProviderId {
        ProviderId::parse("google").unwrap()
    }
}
