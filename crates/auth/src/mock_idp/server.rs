//! Mock IdP server for development and testing.

use axum::{
    extract::Query,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;

use super::templates;
use crate::providers::MockCode;

#[derive(Debug, Deserialize)]
struct AuthorizeQuery {
    provider: String,
    state: String,
    nonce: String,
    code_challenge: String,
    code_challenge_method: Option<String>,
    redirect_uri: String,
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    email: String,
    name: Option<String>,
    provider: String,
    state: String,
    nonce: String,
    code_challenge: String,
    redirect_uri: String,
}

/// Mock IdP server that simulates an OIDC authorization endpoint.
pub struct MockIdpServer {
    port: u16,
}

impl MockIdpServer {
    /// Create a new Mock IdP server.
    ///
    /// # Arguments
    /// * `port` - The port to listen on (typically 3001)
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Routes served by the mock IdP.
    ///
    /// - `GET /authorize` - login page
    /// - `POST /authorize/submit` - form submission, redirects to the callback
    pub fn router() -> Router {
        Router::new()
            .route("/authorize", get(authorize))
            .route("/authorize/submit", post(authorize_submit))
    }

    /// Run the Mock IdP server until the listener fails.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        tracing::info!("Mock IdP server listening on http://{}", addr);

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, Self::router()).await
    }
}

async fn authorize(Query(params): Query<AuthorizeQuery>) -> Response {
    if params.code_challenge_method.as_deref() != Some("S256") {
        return (
            StatusCode::BAD_REQUEST,
            "code_challenge_method must be S256",
        )
            .into_response();
    }

    Html(templates::login_page(&templates::LoginPage {
        provider: &params.provider,
        state: &params.state,
        nonce: &params.nonce,
        code_challenge: &params.code_challenge,
        redirect_uri: &params.redirect_uri,
    }))
    .into_response()
}

async fn authorize_submit(Form(form): Form<LoginForm>) -> Response {
    let code = MockCode {
        sub: format!("mock-{}-{}", form.provider, form.email),
        name: form.name.filter(|n| !n.trim().is_empty()),
        nonce: form.nonce,
        code_challenge: form.code_challenge,
    }
    .encode();

    tracing::debug!(provider = %form.provider, "Mock IdP issuing authorization code");

    let callback_url = format!(
        "{}?code={}&state={}",
        form.redirect_uri,
        urlencoding::encode(&code),
        urlencoding::encode(&form.state),
    );
    Redirect::to(&callback_url).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_authorize_renders_login_page() {
        let response = MockIdpServer::router()
            .oneshot(
                Request::builder()
                    .uri("/authorize?provider=mock&state=s1&nonce=n1&code_challenge=c1&code_challenge_method=S256&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fmock%2Fcallback")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains(r#"name="state" value="s1""#));
        assert!(html.contains(r#"name="nonce" value="n1""#));
        assert!(html.contains(r#"name="code_challenge" value="c1""#));
    }

    #[tokio::test]
    async fn test_authorize_requires_s256() {
        let response = MockIdpServer::router()
            .oneshot(
                Request::builder()
                    .uri("/authorize?provider=mock&state=s1&nonce=n1&code_challenge=c1&code_challenge_method=plain&redirect_uri=http%3A%2F%2Flocalhost")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_submit_redirects_with_code() {
        let response = MockIdpServer::router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/authorize/submit")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "email=dev%40example.com&name=Dev&provider=mock&state=s1&nonce=n1&code_challenge=c1&redirect_uri=http%3A%2F%2Flocalhost%3A3000%2Fauth%2Fmock%2Fcallback",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response.headers()["location"].to_str().unwrap();
        let url = url::Url::parse(location).unwrap();
        assert_eq!(url.path(), "/auth/mock/callback");

        let pairs: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs["state"], "s1");

        let code = MockCode::decode(&pairs["code"]).unwrap();
        assert_eq!(code.sub, "mock-mock-dev@example.com");
        assert_eq!(code.name.as_deref(), Some("Dev"));
        assert_eq!(code.nonce, "n1");
        assert_eq!(code.code_challenge, "c1");
    }
}
