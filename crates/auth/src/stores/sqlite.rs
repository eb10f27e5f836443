//! SQLite-backed stores.
//!
//! All four stores share one connection pool. Timestamps are stored as
//! fixed-width RFC 3339 text so that SQL comparisons order correctly.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;

use sessiongate_core::auth::{
    is_params_expired, is_session_expired, params_expires_at, Clock, Identity,
    IdentityRepository, Params, ParamsRepository, ProviderId, Session, SessionId,
    SessionRepository, StoreError, StoreResult, User, UserId, UserRepository,
};

fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn from_db(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Backend(e.to_string()))
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn parse_provider(value: &str) -> StoreResult<ProviderId> {
    ProviderId::parse(value)
        .map_err(|_| StoreError::Backend(format!("Unknown provider: {}", value)))
}

fn parse_user_id(value: &str) -> StoreResult<UserId> {
    value
        .parse()
        .map_err(|_| StoreError::Backend(format!("Invalid user id: {}", value)))
}

/// The four SQLite stores over a shared pool.
#[derive(Clone)]
pub struct SqliteStores {
    pub params: SqliteParamsStore,
    pub sessions: SqliteSessionStore,
    pub users: SqliteUserStore,
    pub identities: SqliteIdentityStore,
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteStores {
    /// Creates the stores over `pool`. Call [`Self::migrate`] before use.
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self {
            params: SqliteParamsStore {
                pool: pool.clone(),
                clock: clock.clone(),
            },
            sessions: SqliteSessionStore {
                pool: pool.clone(),
                clock: clock.clone(),
            },
            users: SqliteUserStore { pool: pool.clone() },
            identities: SqliteIdentityStore { pool: pool.clone() },
            pool,
            clock,
        }
    }

    /// Connects to `url` (e.g. `sqlite://sessiongate.db?mode=rwc`) and migrates.
    pub async fn connect(url: &str, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let pool = SqlitePool::connect(url).await.map_err(backend)?;
        let stores = Self::new(pool, clock);
        stores.migrate().await?;
        Ok(stores)
    }

    /// Runs database migrations to create required tables.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS auth_params (
                state TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                nonce TEXT NOT NULL,
                code_verifier TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_auth_params_expires_at ON auth_params(expires_at);

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS identities (
                provider TEXT NOT NULL,
                subject TEXT NOT NULL,
                user_id TEXT NOT NULL REFERENCES users(id),
                created_at TEXT NOT NULL,
                UNIQUE (provider, subject)
            );
            CREATE INDEX IF NOT EXISTS idx_identities_user_id ON identities(user_id);

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    /// Deletes expired params and sessions. Returns the number of rows removed.
    pub async fn purge_expired(&self) -> StoreResult<u64> {
        let now = to_db(self.clock.now());

        let params = sqlx::query("DELETE FROM auth_params WHERE expires_at <= ?")
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(params.rows_affected() + sessions.rows_affected())
    }
}

type ParamsRow = (String, String, String, String, String);

fn params_from_row(row: ParamsRow) -> StoreResult<Params> {
    let (state, provider, nonce, code_verifier, created_at) = row;
    Ok(Params {
        provider: parse_provider(&provider)?,
        state,
        nonce,
        code_verifier,
        created_at: from_db(&created_at)?,
    })
}

/// SQLite authorization-attempt store.
#[derive(Clone)]
pub struct SqliteParamsStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl ParamsRepository for SqliteParamsStore {
    async fn save(&self, params: &Params) -> StoreResult<()> {
        if is_params_expired(params, self.clock.now()) {
            return Err(StoreError::Expired {
                entity_type: "Params",
                id: params.state.clone(),
            });
        }

        let result = sqlx::query(
            "INSERT INTO auth_params (state, provider, nonce, code_verifier, created_at, expires_at) VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT(state) DO NOTHING",
        )
        .bind(&params.state)
        .bind(params.provider.as_str())
        .bind(&params.nonce)
        .bind(&params.code_verifier)
        .bind(to_db(params.created_at))
        .bind(to_db(params_expires_at(params)))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity_type: "Params",
                id: params.state.clone(),
            });
        }

        Ok(())
    }

    async fn get_by_state(&self, state: &str) -> StoreResult<Option<Params>> {
        let row = sqlx::query_as::<_, ParamsRow>(
            "SELECT state, provider, nonce, code_verifier, created_at FROM auth_params WHERE state = ? AND expires_at > ?",
        )
        .bind(state)
        .bind(to_db(self.clock.now()))
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(params_from_row).transpose()
    }

    async fn take_by_state(&self, state: &str) -> StoreResult<Option<Params>> {
        // A single DELETE ... RETURNING keeps read-and-consume atomic, so a
        // state can never be redeemed twice.
        let row = sqlx::query_as::<_, (String, String, String, String, String, String)>(
            "DELETE FROM auth_params WHERE state = ? RETURNING state, provider, nonce, code_verifier, created_at, expires_at",
        )
        .bind(state)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        let Some((state, provider, nonce, code_verifier, created_at, expires_at)) = row else {
            return Ok(None);
        };

        if from_db(&expires_at)? <= self.clock.now() {
            return Ok(None);
        }

        params_from_row((state, provider, nonce, code_verifier, created_at)).map(Some)
    }
}

/// SQLite session store.
#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

#[async_trait]
impl SessionRepository for SqliteSessionStore {
    async fn save(&self, session: &Session) -> StoreResult<()> {
        if is_session_expired(session, self.clock.now()) {
            return Err(StoreError::Expired {
                entity_type: "Session",
                id: session.id.to_string(),
            });
        }

        sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(session.id.as_str())
            .bind(session.user_id.to_string())
            .bind(to_db(session.created_at))
            .bind(to_db(session.expires_at))
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }

    async fn get(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT id, user_id, created_at, expires_at FROM sessions WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some((id, user_id, created_at, expires_at)) => Ok(Some(Session {
                id: SessionId::new(id),
                user_id: parse_user_id(&user_id)?,
                created_at: from_db(&created_at)?,
                expires_at: from_db(&expires_at)?,
            })),
            None => Ok(None),
        }
    }

    async fn delete(&self, id: &SessionId) -> StoreResult<()> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        Ok(())
    }
}

/// SQLite user store.
#[derive(Clone)]
pub struct SqliteUserStore {
    pool: SqlitePool,
}

#[async_trait]
impl UserRepository for SqliteUserStore {
    async fn save(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO users (id, name, created_at) VALUES (?, ?, ?) ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(user.id.to_string())
        .bind(&user.name)
        .bind(to_db(user.created_at))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn get_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, (String, String, String)>(
            "SELECT id, name, created_at FROM users WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some((id, name, created_at)) => Ok(Some(User {
                id: parse_user_id(&id)?,
                name,
                created_at: from_db(&created_at)?,
            })),
            None => Ok(None),
        }
    }
}

/// SQLite identity store. Uniqueness is enforced by `UNIQUE(provider, subject)`.
#[derive(Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

#[async_trait]
impl IdentityRepository for SqliteIdentityStore {
    async fn save(&self, identity: &Identity) -> StoreResult<()> {
        let result = sqlx::query(
            "INSERT INTO identities (provider, subject, user_id, created_at) VALUES (?, ?, ?, ?) ON CONFLICT(provider, subject) DO NOTHING",
        )
        .bind(identity.provider.as_str())
        .bind(&identity.subject)
        .bind(identity.user_id.to_string())
        .bind(to_db(identity.created_at))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Lost the insert: fine only if the existing row is the same binding.
        match self
            .get_by_provider_subject(&identity.provider, &identity.subject)
            .await?
        {
            Some(existing) if existing.user_id == identity.user_id => Ok(()),
            _ => Err(StoreError::AlreadyExists {
                entity_type: "Identity",
                id: format!("{}/{}", identity.provider, identity.subject),
            }),
        }
    }

    async fn get_by_provider_subject(
        &self,
        provider: &ProviderId,
        subject: &str,
    ) -> StoreResult<Option<Identity>> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT provider, subject, user_id, created_at FROM identities WHERE provider = ? AND subject = ?",
        )
        .bind(provider.as_str())
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        match row {
            Some((provider, subject, user_id, created_at)) => Ok(Some(Identity {
                user_id: parse_user_id(&user_id)?,
                provider: parse_provider(&provider)?,
                subject,
                created_at: from_db(&created_at)?,
            })),
            None => Ok(None),
        }
    }
}
