//! HTTP handlers for auth routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sessiongate_core::auth::{AuthError as CoreError, ProviderId};
use url::Url;

use crate::error::AuthError;
use crate::extractors::{BearerToken, CurrentUser};
use crate::service::AuthService;

/// Query parameters for OAuth callback.
///
/// Providers send `error` instead of `code` when the user declines.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub authorization_url: Url,
    pub state: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user_id: String,
}

/// Creates the auth router with all authentication routes.
///
/// Routes:
/// - `GET /auth/{provider}/login` - Redirect to the provider
/// - `GET /auth/{provider}/authorize` - Authorization URL and state as JSON
/// - `GET /auth/{provider}/callback` - Complete login, returns the session token
/// - `GET /auth/me` - Current user's id
/// - `POST /auth/logout` - End the current session
pub fn auth_routes() -> Router<AuthService> {
    Router::new()
        .route("/auth/{provider}/login", get(login))
        .route("/auth/{provider}/authorize", get(authorize))
        .route("/auth/{provider}/callback", get(callback))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
}

/// Unknown ids are reported like unconfigured providers.
fn provider_id(raw: &str) -> Result<ProviderId, AuthError> {
    ProviderId::parse(raw).map_err(|_| {
        AuthError::Core(CoreError::Configuration(format!(
            "provider '{}' is not configured",
            raw
        )))
    })
}

async fn login(
    State(service): State<AuthService>,
    Path(provider): Path<String>,
) -> Result<Redirect, AuthError> {
    let request = service.generate(&provider_id(&provider)?).await?;
    Ok(Redirect::to(request.authorization_url.as_str()))
}

async fn authorize(
    State(service): State<AuthService>,
    Path(provider): Path<String>,
) -> Result<Json<AuthorizeResponse>, AuthError> {
    let request = service.generate(&provider_id(&provider)?).await?;
    Ok(Json(AuthorizeResponse {
        authorization_url: request.authorization_url,
        state: request.state,
    }))
}

async fn callback(
    State(service): State<AuthService>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<TokenResponse>, AuthError> {
    let provider = provider_id(&provider)?;

    if let Some(error) = query.error {
        tracing::warn!(%provider, %error, "Provider returned an error");
        let message = format!("provider returned error: {}", error);
        return Err(CoreError::InvalidRequest(message).into());
    }

    let code = query
        .code
        .ok_or_else(|| CoreError::InvalidRequest("code is missing".to_string()))?;
    let state = query
        .state
        .ok_or_else(|| CoreError::InvalidRequest("state is missing".to_string()))?;

    let token = service.login(&provider, &code, &state).await?;
    Ok(Json(TokenResponse { token }))
}

async fn me(CurrentUser(user_id): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        user_id: user_id.to_string(),
    })
}

async fn logout(
    State(service): State<AuthService>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, AuthError> {
    service.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use std::collections::HashMap;
    use tower::ServiceExt;

    use crate::config::AuthConfig;
    use crate::testing::{providers, Fixture, StubProvider};

    fn app(fx: &Fixture) -> Router {
        let vars: HashMap<&str, &str> =
            [("SESSION_SECRET", "0123456789abcdef0123456789abcdef")]
                .into_iter()
                .collect();
        let config =
            AuthConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        let service = AuthService::new(
            &config,
            (*providers(StubProvider::new("google"))).clone(),
            fx.repos.clone(),
            fx.clock(),
        )
        .unwrap();

        auth_routes().with_state(service)
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_bearer(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())
            .unwrap()
    }

    async fn sign_in(app: &Router) -> String {
        let (status, body) = send(app, get("/auth/google/authorize")).await;
        assert_eq!(status, StatusCode::OK);
        let state = body["state"].as_str().unwrap().to_string();

        let (status, body) = send(
            app,
            get(&format!("/auth/google/callback?code=sub-1&state={}", state)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_login_redirects_to_provider() {
        let fx = Fixture::new();
        let response = app(&fx).oneshot(get("/auth/google/login")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        assert!(location.starts_with("https://idp.example/authorize?"));
        assert!(location.contains("code_challenge_method=S256"));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_not_found() {
        let fx = Fixture::new();
        let app = app(&fx);

        let (status, body) = send(&app, get("/auth/github/authorize")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());

        let (status, _) = send(&app, get("/auth/Not%20Valid/login")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_full_session_lifecycle() {
        let fx = Fixture::new();
        let app = app(&fx);
        let token = sign_in(&app).await;

        let (status, body) = send(&app, with_bearer("GET", "/auth/me", &token)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["user_id"]
            .as_str()
            .unwrap()
            .parse::<sessiongate_core::auth::UserId>()
            .is_ok());

        let (status, _) = send(&app, with_bearer("POST", "/auth/logout", &token)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, with_bearer("GET", "/auth/me", &token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_callback_with_unknown_state() {
        let fx = Fixture::new();
        let (status, body) = send(
            &app(&fx),
            get("/auth/google/callback?code=sub-1&state=forged"),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid OIDC state parameter");
    }

    #[tokio::test]
    async fn test_callback_with_provider_error() {
        let fx = Fixture::new();
        let (status, _) = send(
            &app(&fx),
            get("/auth/google/callback?error=access_denied&state=s"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_callback_missing_code() {
        let fx = Fixture::new();
        let (status, _) = send(&app(&fx), get("/auth/google/callback?state=s")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_me_requires_bearer() {
        let fx = Fixture::new();
        let app = app(&fx);

        let (status, _) = send(&app, get("/auth/me")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, with_bearer("GET", "/auth/me", "garbage")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
