//! OIDC login and signed session lifecycle for sessiongate.
//!
//! This crate provides:
//! - The login engine: [`ParamsGenerator`], [`LoginOrchestrator`],
//!   [`SessionValidator`] and [`Revoker`], composed by [`AuthService`]
//! - HS256 session tokens ([`TokenCodec`])
//! - OIDC discovery and mock providers
//! - In-memory and SQLite stores (SQLite via the `sqlite` feature)
//! - Axum routes and extractors

mod config;
mod error;
mod extractors;
mod handlers;
mod login;
mod logout;
mod params;
mod providers;
mod service;
mod stores;
#[cfg(test)]
mod testing;
mod token;
mod validator;

pub use config::{AuthConfig, ProviderConfig};
pub use error::AuthError;
pub use extractors::{BearerToken, CurrentUser};
pub use handlers::{auth_routes, AuthorizeResponse, CallbackQuery, MeResponse, TokenResponse};
pub use login::{LoginOrchestrator, LoginStage};
pub use logout::Revoker;
pub use params::ParamsGenerator;
#[cfg(feature = "mock")]
pub use providers::{MockCode, MockProvider};
pub use providers::{OidcProvider, ProviderEntry, ProviderSet};
pub use service::{with_deadline, AuthService};
pub use stores::{
    InMemoryIdentityStore, InMemoryParamsStore, InMemorySessionStore, InMemoryUserStore,
    Repositories,
};
#[cfg(feature = "sqlite")]
pub use stores::{
    SqliteIdentityStore, SqliteParamsStore, SqliteSessionStore, SqliteStores, SqliteUserStore,
};
pub use token::{TokenCodec, TokenError, VerifiedClaims};
pub use validator::SessionValidator;

#[cfg(feature = "mock")]
pub mod mock_idp;
