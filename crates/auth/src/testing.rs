//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sessiongate_core::auth::{
    code_challenge_s256, AuthorizationProvider, Clock, LoginProvider, ManualClock,
    ProviderClaims, ProviderError, ProviderId, ProviderResult,
};
use url::Url;

use crate::providers::ProviderSet;
use crate::stores::{
    InMemoryIdentityStore, InMemoryParamsStore, InMemorySessionStore, InMemoryUserStore,
    Repositories,
};
use crate::token::TokenCodec;

pub const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

/// Code that [`StubProvider`] refuses to redeem.
pub const REJECTED_CODE: &str = "rejected";

/// What the stub puts in the `nonce` claim.
#[derive(Clone)]
pub enum NonceReply {
    Echo,
    Replace(String),
    Omit,
}

/// Provider that remembers the nonce issued for each PKCE challenge and
/// treats the authorization code as the subject.
pub struct StubProvider {
    id: ProviderId,
    name: Option<String>,
    nonce: NonceReply,
    delay: Option<std::time::Duration>,
    issued: Mutex<HashMap<String, String>>,
}

impl StubProvider {
    pub fn new(id: &str) -> Self {
        Self {
            id: ProviderId::parse(id).unwrap(),
            name: Some("Ada Lovelace".to_string()),
            nonce: NonceReply::Echo,
            delay: None,
            issued: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_nonce(mut self, nonce: NonceReply) -> Self {
        self.nonce = nonce;
        self
    }

    /// Makes every code exchange take `delay`.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
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

        let mut url = Url::parse("https://idp.example/authorize").unwrap();
        url.query_pairs_mut()
            .append_pair("client_id", "stub-client")
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
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if code == REJECTED_CODE {
            return Err(ProviderError::Exchange("invalid_grant".to_string()));
        }

        let issued_nonce = self
            .issued
            .lock()
            .unwrap()
            .get(&code_challenge_s256(code_verifier))
            .cloned()
            .ok_or_else(|| ProviderError::Exchange("PKCE verification failed".to_string()))?;

        let nonce = match &self.nonce {
            NonceReply::Echo => Some(issued_nonce),
            NonceReply::Replace(n) => Some(n.clone()),
            NonceReply::Omit => None,
        };

        Ok(ProviderClaims {
            subject: code.to_string(),
            name: self.name.clone(),
            nonce,
        })
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

/// In-memory stores, a manual clock and a codec sharing it.
///
/// The concrete store handles share state with `repos`.
pub struct Fixture {
    pub clock: ManualClock,
    pub repos: Repositories,
    pub sessions: InMemorySessionStore,
    pub users: InMemoryUserStore,
    pub identities: InMemoryIdentityStore,
    pub codec: Arc<TokenCodec>,
    pub session_ttl: Duration,
}

impl Fixture {
    pub fn new() -> Self {
        let clock = ManualClock::new(start_time());
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let sessions = InMemorySessionStore::new(shared.clone());
        let users = InMemoryUserStore::new();
        let identities = InMemoryIdentityStore::new();
        Self {
            repos: Repositories {
                params: Arc::new(InMemoryParamsStore::new(shared.clone())),
                sessions: Arc::new(sessions.clone()),
                users: Arc::new(users.clone()),
                identities: Arc::new(identities.clone()),
            },
            sessions,
            users,
            identities,
            codec: Arc::new(TokenCodec::new(SECRET, "sessiongate-test", shared).unwrap()),
            clock,
            session_ttl: Duration::hours(8),
        }
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clock.clone())
    }
}

/// `google` can log in; `partner` can only build URLs.
pub fn providers(google: StubProvider) -> Arc<ProviderSet> {
    Arc::new(
        ProviderSet::new()
            .with_login(Arc::new(google))
            .unwrap()
            .with_authorize_only(Arc::new(StubProvider::new("partner")))
            .unwrap(),
    )
}
