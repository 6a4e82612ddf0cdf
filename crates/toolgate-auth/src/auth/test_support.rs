//! Shared fixtures for auth unit tests

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use url::Url;

pub const RSA_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rsa_private.pem");
pub const RSA_PUBLIC_PEM: &str = include_str!("../../tests/fixtures/rsa_public.pem");
pub const RSA_OTHER_PRIVATE_PEM: &str = include_str!("../../tests/fixtures/rsa_other_private.pem");
pub const RSA_PUBLIC_JWK: &str = include_str!("../../tests/fixtures/rsa_public.jwk.json");

/// `kid` of the key in `rsa_public.jwk.json`
pub const TEST_KID: &str = "test-key-1";

pub const HS_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn jwks_document() -> Value {
    let jwk: Value = serde_json::from_str(RSA_PUBLIC_JWK).unwrap();
    json!({ "keys": [jwk] })
}

pub fn sign_rs256(claims: &Value, kid: Option<&str>) -> String {
    sign_rs256_with(RSA_PRIVATE_PEM, claims, kid)
}

pub fn sign_rs256_with(private_pem: &str, claims: &Value, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(ToString::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

pub fn sign_hs256(claims: &Value) -> String {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(HS_SECRET.as_bytes()),
    )
    .unwrap()
}

/// Token shaped like the ones an identity provider would issue to a tool client
pub fn create_test_token(
    subject: &str,
    issuer: &str,
    audience: Option<&str>,
    scopes: &[&str],
    kid: &str,
) -> String {
    let mut claims = json!({
        "sub": subject,
        "iss": issuer,
        "iat": now_secs(),
        "exp": now_secs() + 3600,
        "scope": scopes.join(" "),
    });
    if let Some(aud) = audience {
        claims["aud"] = json!(aud);
    }
    sign_rs256(&claims, Some(kid))
}

/// Serve `router` on an ephemeral loopback port
pub async fn spawn_server(router: axum::Router) -> (Url, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (Url::parse(&format!("http://{addr}")).unwrap(), handle)
}

/// URL on which nothing is listening
pub async fn unreachable_url() -> Url {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/.well-known/openid-configuration")).unwrap()
}
