use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sessiongate_core::auth::{ProviderError, StoreError};
use thiserror::Error;

/// Auth errors for the sessiongate_auth crate.
///
/// This wraps the core `AuthError` and adds crate-specific error variants
/// for setup and I/O that can't be in the functional core.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Error from the core taxonomy (what the engine's operations return)
    #[error(transparent)]
    Core(#[from] sessiongate_core::auth::AuthError),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider setup failed (e.g., OIDC discovery)
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Store setup failed (e.g., connection or migration)
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl AuthError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        use sessiongate_core::auth::AuthError as CoreError;

        match self {
            AuthError::Core(core_err) => match core_err {
                CoreError::Configuration(_) => StatusCode::NOT_FOUND,
                CoreError::InvalidRequest(_)
                | CoreError::InvalidState
                | CoreError::InvalidCode(_)
                | CoreError::InvalidNonce => StatusCode::BAD_REQUEST,
                CoreError::IdentityConflict => StatusCode::CONFLICT,
                CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
                CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AuthError::Provider(_) => StatusCode::BAD_GATEWAY,
            AuthError::Config(_) | AuthError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        use sessiongate_core::auth::AuthError as CoreError;

        let status = self.status();
        let message = match &self {
            AuthError::Core(core_err) => {
                if core_err.is_client_error() {
                    tracing::warn!("Auth request rejected: {}", self);
                } else {
                    tracing::error!("Auth error: {}", self);
                }

                match core_err {
                    CoreError::Configuration(_) => {
                        "Authentication provider is not configured".to_string()
                    }
                    CoreError::InvalidCode(_) => "Authorization code was rejected".to_string(),
                    CoreError::Internal(_) => "Internal server error".to_string(),
                    _ => self.to_string(),
                }
            }
            AuthError::Provider(_) => {
                tracing::error!("Provider error: {}", self);
                "Authentication provider error".to_string()
            }
            AuthError::Config(_) | AuthError::Store(_) => {
                tracing::error!("Setup error: {}", self);
                "Server configuration error".to_string()
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
