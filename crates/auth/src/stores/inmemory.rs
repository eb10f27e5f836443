//! In-memory stores for development and testing.
//!
//! Each store keeps its records in a `HashMap` wrapped in `Arc<RwLock<_>>`.
//! Clones share state. Data is not persisted and is lost when the last
//! clone is dropped. Expired params are filtered on read; session expiry
//! is left to the validator. Each `save` evicts records already past their
//! expiry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sessiongate_core::auth::{
    is_params_expired, is_session_expired, Clock, Identity, IdentityRepository, Params,
    ParamsRepository, ProviderId, Session, SessionId, SessionRepository, StoreError, StoreResult,
    User, UserId, UserRepository,
};

/// In-memory authorization-attempt store.
#[derive(Clone)]
pub struct InMemoryParamsStore {
    params: Arc<RwLock<HashMap<String, Params>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryParamsStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            params: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of records held, expired ones included.
    pub async fn len(&self) -> usize {
        self.params.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.params.read().await.is_empty()
    }
}

#[async_trait]
impl ParamsRepository for InMemoryParamsStore {
    async fn save(&self, params: &Params) -> StoreResult<()> {
        let now = self.clock.now();
        if is_params_expired(params, now) {
            return Err(StoreError::Expired {
                entity_type: "Params",
                id: params.state.clone(),
            });
        }

        let mut all = self.params.write().await;
        all.retain(|_, p| !is_params_expired(p, now));
        if all.contains_key(&params.state) {
            return Err(StoreError::AlreadyExists {
                entity_type: "Params",
                id: params.state.clone(),
            });
        }
        all.insert(params.state.clone(), params.clone());
        Ok(())
    }

    async fn get_by_state(&self, state: &str) -> StoreResult<Option<Params>> {
        let all = self.params.read().await;
        let now = self.clock.now();
        Ok(all
            .get(state)
            .filter(|p| !is_params_expired(p, now))
            .cloned())
    }

    async fn take_by_state(&self, state: &str) -> StoreResult<Option<Params>> {
        let mut all = self.params.write().await;
        let now = self.clock.now();
        Ok(all.remove(state).filter(|p| !is_params_expired(p, now)))
    }
}

/// In-memory session store.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    clock: Arc<dyn Clock>,
}

impl InMemorySessionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of records held, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionStore {
    async fn save(&self, session: &Session) -> StoreResult<()> {
        let now = self.clock.now();
        if is_session_expired(session, now) {
            return Err(StoreError::Expired {
                entity_type: "Session",
                id: session.id.to_string(),
            });
        }

        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| !is_session_expired(s, now));
        if sessions.contains_key(session.id.as_str()) {
            return Err(StoreError::AlreadyExists {
                entity_type: "Session",
                id: session.id.to_string(),
            });
        }
        sessions.insert(session.id.as_str().to_string(), session.clone());
        Ok(())
    }

    async fn get(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(id.as_str()).cloned())
    }

    async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id.as_str());
        Ok(())
    }
}

/// In-memory user store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserStore {
    async fn save(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }
}

/// In-memory identity store. Check-and-insert happens under one write lock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityStore {
    identities: Arc<RwLock<HashMap<(ProviderId, String), Identity>>>,
}

impl InMemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.identities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.identities.read().await.is_empty()
    }
}

#[async_trait]
impl IdentityRepository for InMemoryIdentityStore {
    async fn save(&self, identity: &Identity) -> StoreResult<()> {
        let key = (identity.provider.clone(), identity.subject.clone());
        let mut identities = self.identities.write().await;

        match identities.get(&key) {
            Some(existing) if existing.user_id == identity.user_id => Ok(()),
            Some(_) => Err(StoreError::AlreadyExists {
                entity_type: "Identity",
                id: format!("{}/{}", identity.provider, identity.subject),
            }),
            None => {
                identities.insert(key, identity.clone());
                Ok(())
            }
        }
    }

    async fn get_by_provider_subject(
        &self,
        provider: &ProviderId,
        subject: &str,
    ) -> StoreResult<Option<Identity>> {
        let identities = self.identities.read().await;
        Ok(identities
            .get(&(provider.clone(), subject.to_string()))
            .cloned())
    }
}
