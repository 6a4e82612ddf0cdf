//! Verifier assembly from configuration
//!
//! Runs once at startup. When only a well-known URI is configured the build
//! awaits discovery, which can take up to the retry policy's full backoff;
//! pass a [`CancellationToken`] to abort it on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use url::Url;

use super::config::VerifierConfig;
use super::discovery::{DiscoveryClient, RetryPolicy, resolve_jwks_and_issuer};
use super::error::{AuthError, Result};
use super::jwks::{JwksCache, JwksRefreshTask};
use super::policy::ClaimPolicy;
use super::verifier::TokenVerifier;

/// Per-request timeout of the shared HTTP client
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for a [`TokenVerifier`]
#[derive(Debug)]
#[must_use]
pub struct VerifierFactory {
    config: VerifierConfig,
    retry_policy: RetryPolicy,
    cancel: CancellationToken,
    http: Option<reqwest::Client>,
    jwks_cache_ttl: Duration,
    refresh_interval: Option<Duration>,
}

impl VerifierFactory {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            retry_policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            http: None,
            jwks_cache_ttl: JwksCache::DEFAULT_TTL,
            refresh_interval: None,
        }
    }

    pub const fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Aborts discovery and stops the background refresh task
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http = Some(client);
        self
    }

    pub const fn jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self
    }

    pub const fn background_refresh(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub async fn build(self) -> Result<TokenVerifier> {
        self.config.validate()?;

        let http = match self.http {
            Some(client) => client,
            None => reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .map_err(|e| AuthError::Config(format!("Failed to build HTTP client: {e}")))?,
        };

        let (jwks_uri, issuer) =
            resolve_endpoints(&self.config, &http, &self.retry_policy, &self.cancel).await?;

        let cache = Arc::new(JwksCache::new(jwks_uri, http, self.jwks_cache_ttl));
        // Not fatal: the first verify retries the fetch
        if let Err(e) = cache.refresh().await {
            tracing::warn!(
                jwks_uri = %cache.jwks_uri(),
                error = %e,
                "Initial JWKS fetch failed"
            );
        }

        if let Some(interval) = self.refresh_interval {
            JwksRefreshTask::new(Arc::clone(&cache), interval).spawn(self.cancel.child_token());
        }

        let algorithm = self.config.algorithm();
        tracing::info!(
            jwks_uri = %cache.jwks_uri(),
            issuer = issuer.as_deref().unwrap_or("<any>"),
            audience = ?self.config.audience,
            ?algorithm,
            "Token verifier ready"
        );

        let policy = ClaimPolicy::new(issuer, self.config.audience);
        Ok(TokenVerifier::new(cache, policy).with_algorithm(algorithm))
    }
}

/// JWKS URI and issuer, running discovery if only a well-known URI is set
async fn resolve_endpoints(
    config: &VerifierConfig,
    http: &reqwest::Client,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<(Url, Option<String>)> {
    if let Some(jwks_uri) = &config.jwks_uri {
        return Ok((jwks_uri.clone(), config.issuer.clone()));
    }

    let well_known = config
        .well_known_uri
        .as_ref()
        .ok_or_else(|| AuthError::Config("AUTH_WELL_KNOWN_URI is not set".into()))?;

    let document = DiscoveryClient::new(http.clone())
        .fetch_document(well_known, policy, cancel)
        .await
        .inspect_err(|e| tracing::error!(error = %e, "OIDC discovery failed"))?;
    let (jwks_uri, discovered_issuer) = resolve_jwks_and_issuer(&document)?;

    let issuer = match &config.issuer {
        Some(configured) if !configured.is_empty() => {
            if configured != &discovered_issuer {
                tracing::warn!(
                    configured = %configured,
                    discovered = %discovered_issuer,
                    "Configured issuer differs from discovery document, keeping configured value"
                );
            }
            configured.clone()
        }
        _ => discovered_issuer,
    };

    tracing::info!(jwks_uri = %jwks_uri, issuer = %issuer, "Resolved endpoints from discovery");
    Ok((jwks_uri, Some(issuer)))
}

/// Build a verifier with the default retry policy (10 attempts, 10 s apart)
pub async fn build_verifier(config: VerifierConfig) -> Result<TokenVerifier> {
    VerifierFactory::new(config).build().await
}
