//! Store implementations.
//!
//! Provides the params, session, user and identity repositories for:
//! - In-memory (always available; development and tests)
//! - SQLite (with `sqlite` feature)

mod inmemory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::sync::Arc;

use sessiongate_core::auth::{
    Clock, IdentityRepository, ParamsRepository, SessionRepository, UserRepository,
};

pub use inmemory::{
    InMemoryIdentityStore, InMemoryParamsStore, InMemorySessionStore, InMemoryUserStore,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{
    SqliteIdentityStore, SqliteParamsStore, SqliteSessionStore, SqliteStores, SqliteUserStore,
};

/// The four repositories the login flow reads and writes.
#[derive(Clone)]
pub struct Repositories {
    pub params: Arc<dyn ParamsRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub users: Arc<dyn UserRepository>,
    pub identities: Arc<dyn IdentityRepository>,
}

impl Repositories {
    /// Fresh in-memory stores sharing `clock`.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            params: Arc::new(InMemoryParamsStore::new(clock.clone())),
            sessions: Arc::new(InMemorySessionStore::new(clock)),
            users: Arc::new(InMemoryUserStore::new()),
            identities: Arc::new(InMemoryIdentityStore::new()),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<SqliteStores> for Repositories {
    fn from(stores: SqliteStores) -> Self {
        Self {
            params: Arc::new(stores.params),
            sessions: Arc::new(stores.sessions),
            users: Arc::new(stores.users),
            identities: Arc::new(stores.identities),
        }
    }
}
