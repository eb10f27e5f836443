//! Session token validation.

use std::sync::Arc;

use sessiongate_core::auth::{
    is_session_expired, AuthError, Clock, Result, SessionRepository, UserId,
};

use crate::token::TokenCodec;

/// Resolves a presented session token to the user it authenticates.
///
/// Validation only reads; it never extends or deletes sessions.
pub struct SessionValidator {
    codec: Arc<TokenCodec>,
    sessions: Arc<dyn SessionRepository>,
    clock: Arc<dyn Clock>,
}

impl SessionValidator {
    pub fn new(
        codec: Arc<TokenCodec>,
        sessions: Arc<dyn SessionRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec,
            sessions,
            clock,
        }
    }

    /// Returns the id of the user `token` was issued to.
    ///
    /// Every rejection (bad signature, expired token, missing or expired
    /// session) is reported as `Unauthenticated`. Only a failing store
    /// yields `Internal`.
    #[tracing::instrument(name = "validate", skip_all)]
    pub async fn validate(&self, token: &str) -> Result<UserId> {
        let claims = self.codec.verify(token).map_err(|e| {
            tracing::debug!(reason = %e, "Token rejected");
            AuthError::Unauthenticated
        })?;

        let session_id = claims.session_id().map_err(|e| {
            tracing::debug!(reason = %e, "Token rejected");
            AuthError::Unauthenticated
        })?;

        let session = self
            .sessions
            .get(&session_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Session lookup failed");
                AuthError::from(e)
            })?
            .ok_or_else(|| {
                tracing::debug!("Session not found");
                AuthError::Unauthenticated
            })?;

        if is_session_expired(&session, self.clock.now()) {
            tracing::debug!(user_id = %session.user_id, "Session expired");
            return Err(AuthError::Unauthenticated);
        }

        Ok(session.user_id)
    }
}
