//! Session revocation.

use std::sync::Arc;

use sessiongate_core::auth::{AuthError, Result, SessionRepository};

use crate::token::TokenCodec;

/// Ends sessions by deleting them from the session store.
pub struct Revoker {
    codec: Arc<TokenCodec>,
    sessions: Arc<dyn SessionRepository>,
}

impl Revoker {
    pub fn new(codec: Arc<TokenCodec>, sessions: Arc<dyn SessionRepository>) -> Self {
        Self { codec, sessions }
    }

    /// Revokes the session behind `token`.
    ///
    /// Expired tokens are accepted. Logging out of a session that no longer
    /// exists succeeds.
    ///
    /// # Errors
    ///
    /// - `Unauthenticated` if the signature is invalid or the token has no
    ///   session id
    /// - `Internal` if the store fails
    #[tracing::instrument(name = "logout", skip_all)]
    pub async fn logout(&self, token: &str) -> Result<()> {
        let claims = self.codec.verify_ignoring_expiry(token).map_err(|e| {
            tracing::debug!(reason = %e, "Token rejected");
            AuthError::Unauthenticated
        })?;

        let session_id = claims.session_id().map_err(|e| {
            tracing::debug!(reason = %e, "Token rejected");
            AuthError::Unauthenticated
        })?;

        self.sessions.delete(&session_id).await.map_err(|e| {
            tracing::error!(error = %e, "Session delete failed");
            AuthError::from(e)
        })?;

        tracing::info!(user_id = %claims.subject(), "Session revoked");
        Ok(())
    }
}
