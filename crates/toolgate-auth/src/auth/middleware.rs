//! Bearer token middleware for axum routers
//!
//! This module requires the `http` feature.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::verifier::TokenVerifier;

const INVALID_TOKEN_CHALLENGE: &str = r#"Bearer error="invalid_token""#;

/// Authentication state for middleware
#[derive(Debug, Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
}

impl AuthState {
    #[must_use]
    pub const fn new(verifier: Arc<TokenVerifier>) -> Self {
        Self { verifier }
    }
}

/// Verify the bearer token and expose the [`AccessToken`](super::AccessToken)
/// to downstream handlers as a request extension.
#[allow(clippy::future_not_send)]
pub async fn bearer_auth_middleware(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(request.headers().get(header::AUTHORIZATION)) else {
        tracing::warn!("Missing or malformed Authorization header");
        return unauthorized();
    };

    match state.verifier.verify(token).await.into_result() {
        Ok(access) => {
            request.extensions_mut().insert(access);
            next.run(request).await
        }
        Err(_) => unauthorized(),
    }
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    let value = value?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, INVALID_TOKEN_CHALLENGE)],
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use axum::routing::get;
    use axum::{Extension, Router};
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::auth::claims::AccessToken;
    use crate::auth::jwks::StaticKeyResolver;
    use crate::auth::policy::ClaimPolicy;
    use crate::auth::test_support::{RSA_PUBLIC_PEM, now_secs, sign_rs256};

    fn app() -> Router {
        let resolver = StaticKeyResolver::from_rsa_pem(RSA_PUBLIC_PEM.as_bytes()).unwrap();
        let verifier = TokenVerifier::new(Arc::new(resolver), ClaimPolicy::default());
        let state = AuthState::new(Arc::new(verifier));

        Router::new()
            .route(
                "/tools",
                get(|Extension(access): Extension<AccessToken>| async move { access.client_id }),
            )
            .layer(axum::middleware::from_fn_with_state(
                state,
                bearer_auth_middleware,
            ))
    }

    fn create_test_request(auth_header: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().uri("/tools").method("GET");
        if let Some(header) = auth_header {
            builder = builder.header(header::AUTHORIZATION, header);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_extract_bearer_token() {
        let value = |s: &'static str| HeaderValue::from_static(s);
        assert_eq!(extract_bearer_token(Some(&value("Bearer abc"))), Some("abc"));
        assert_eq!(extract_bearer_token(Some(&value("bearer abc"))), Some("abc"));
        assert_eq!(extract_bearer_token(Some(&value("Basic dXNlcjpwYXNz"))), None);
        assert_eq!(extract_bearer_token(Some(&value("Bearer "))), None);
        assert_eq!(extract_bearer_token(Some(&value("Bearer"))), None);
        assert_eq!(extract_bearer_token(None), None);
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let token = sign_rs256(&json!({ "sub": "agent-7", "exp": now_secs() + 60 }), None);
        let response = app()
            .oneshot(create_test_request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "agent-7");
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let response = app().oneshot(create_test_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            INVALID_TOKEN_CHALLENGE
        );
    }

    #[tokio::test]
    async fn test_rejected_token_is_not_echoed() {
        let token = sign_rs256(&json!({ "sub": "agent-7", "exp": now_secs() - 60 }), None);
        let response = app()
            .oneshot(create_test_request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_text(response).await;
        assert!(!body.contains(&token));
    }
}
