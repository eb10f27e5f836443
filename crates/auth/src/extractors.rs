//! Axum extractors for authentication.

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use sessiongate_core::auth::{parse_bearer, AuthError as CoreError, UserId};

use crate::error::AuthError;
use crate::service::AuthService;

/// The raw token from an `Authorization: Bearer` header.
///
/// Rejects with 401 if the header is absent or not a bearer credential.
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(CoreError::Unauthenticated)?;

        let value = header.to_str().map_err(|_| CoreError::Unauthenticated)?;
        let token = parse_bearer(value).ok_or(CoreError::Unauthenticated)?;

        Ok(BearerToken(token.to_string()))
    }
}

/// Extractor for authenticated user. Returns 401 if not authenticated.
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    AuthService: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let service = AuthService::from_ref(state);

        let user_id = service.validate(&token).await?;
        Ok(CurrentUser(user_id))
    }
}
