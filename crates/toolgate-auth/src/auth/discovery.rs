//! OIDC discovery document fetching
//!
//! Fetches the well-known document with a bounded number of attempts and a
//! fixed delay between them. The delay is a cancellable sleep so a shutdown
//! signal can abort a retry loop that would otherwise run for minutes.

use std::num::NonZeroU32;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::{AuthError, DiscoveryError, FetchFailure, Result};

/// Retry schedule for discovery: `retries` attempts, `delay` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: NonZeroU32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_RETRIES: NonZeroU32 = NonZeroU32::MIN.saturating_add(9); // 10
    pub const DEFAULT_DELAY: Duration = Duration::from_secs(10);

    #[must_use]
    pub const fn new(retries: NonZeroU32, delay: Duration) -> Self {
        Self { retries, delay }
    }

    /// Worst-case time spent sleeping between attempts
    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        self.delay.saturating_mul(self.retries.get() - 1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RETRIES, Self::DEFAULT_DELAY)
    }
}

/// Parsed discovery document, kept verbatim
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryDocument(Map<String, Value>);

impl DiscoveryDocument {
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    fn non_empty_str(&self, field: &str) -> Option<&str> {
        self.get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    #[must_use]
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for DiscoveryDocument {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

/// Pull the JWKS URI and issuer out of a discovery document
pub fn resolve_jwks_and_issuer(document: &DiscoveryDocument) -> Result<(Url, String)> {
    let (Some(jwks_uri), Some(issuer)) = (
        document.non_empty_str("jwks_uri"),
        document.non_empty_str("issuer"),
    ) else {
        return Err(AuthError::Config(
            "jwks_uri or issuer not found in well-known configuration".into(),
        ));
    };

    let jwks_uri = Url::parse(jwks_uri)
        .map_err(|e| AuthError::Config(format!("Invalid jwks_uri in discovery document: {e}")))?;

    Ok((jwks_uri, issuer.to_string()))
}

/// HTTP client for OIDC discovery
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    http: reqwest::Client,
}

impl DiscoveryClient {
    #[must_use]
    pub const fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Fetch the discovery document, retrying per `policy`.
    ///
    /// Only non-2xx responses and connection failures are retried.
    /// Returns [`DiscoveryError::Exhausted`] wrapping the last failure once
    /// every attempt has failed, [`DiscoveryError::InvalidDocument`] as soon
    /// as a 2xx body fails to decode, or [`DiscoveryError::Cancelled`] as soon
    /// as `cancel` fires.
    pub async fn fetch_document(
        &self,
        url: &Url,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> std::result::Result<DiscoveryDocument, DiscoveryError> {
        let attempts = policy.retries.get();
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(DiscoveryError::Cancelled {
                    url: url.clone(),
                    attempts: attempt - 1,
                });
            }

            tracing::info!(
                url = %url,
                attempt,
                attempts,
                "Fetching OIDC discovery document"
            );

            let result = tokio::select! {
                result = self.send_once(url) => result,
                () = cancel.cancelled() => {
                    return Err(DiscoveryError::Cancelled { url: url.clone(), attempts: attempt });
                }
            };

            let failure = match result {
                Ok(response) => {
                    let fields: Map<String, Value> =
                        response.json().await.map_err(|source| {
                            DiscoveryError::InvalidDocument {
                                url: url.clone(),
                                attempts: attempt,
                                source,
                            }
                        })?;
                    return Ok(DiscoveryDocument(fields));
                }
                Err(failure) => failure,
            };

            tracing::warn!(
                url = %url,
                attempt,
                attempts,
                error = %failure,
                "Failed to fetch OIDC discovery document"
            );

            if attempt >= attempts {
                return Err(DiscoveryError::Exhausted {
                    url: url.clone(),
                    attempts,
                    cause: failure,
                });
            }

            tracing::warn!(delay = ?policy.delay, "Retrying OIDC discovery");
            tokio::select! {
                () = tokio::time::sleep(policy.delay) => {}
                () = cancel.cancelled() => {
                    return Err(DiscoveryError::Cancelled { url: url.clone(), attempts: attempt });
                }
            }

            attempt += 1;
        }
    }

    async fn send_once(&self, url: &Url) -> std::result::Result<reqwest::Response, FetchFailure> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(FetchFailure::Connect)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status));
        }

        Ok(response)
    }
}
