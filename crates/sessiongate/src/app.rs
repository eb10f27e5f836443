use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use sessiongate_auth::{auth_routes, AuthService};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Create the application router with all routes and middleware.
///
/// The request timeout sits above the per-operation deadline inside
/// [`AuthService`], so engine timeouts surface as their own errors first.
pub fn create_app(service: AuthService, request_timeout: Duration) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/auth/providers", get(list_providers))
        .merge(auth_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(service)
}

/// GET /healthz - liveness probe.
async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /auth/providers - ids of the configured identity providers.
async fn list_providers(State(service): State<AuthService>) -> Json<serde_json::Value> {
    let providers: Vec<&str> = service
        .providers()
        .ids()
        .into_iter()
        .map(|id| id.as_str())
        .collect();
    Json(serde_json::json!({ "providers": providers }))
}
