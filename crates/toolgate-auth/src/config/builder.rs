//! Configuration builder

use std::num::NonZeroU32;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::auth::{JwksCache, OneOrMany, RetryPolicy, VerifierConfig, VerifierFactory};

/// Gateway authentication configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub auth: VerifierConfig,
    pub discovery: RetryPolicy,
    pub jwks: JwksConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    #[must_use]
    pub const fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Factory preloaded with this configuration's retry and cache settings
    pub fn verifier_factory(&self) -> VerifierFactory {
        VerifierFactory::new(self.auth.clone())
            .retry_policy(self.discovery)
            .jwks_cache_ttl(self.jwks.cache_ttl)
            .background_refresh(self.jwks.refresh_interval)
    }
}

/// JWKS cache configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwksConfig {
    pub cache_ttl: Duration,
    /// Background refresh period; `None` refreshes only on TTL expiry or key-id miss
    pub refresh_interval: Option<Duration>,
}

impl Default for JwksConfig {
    fn default() -> Self {
        Self {
            cache_ttl: JwksCache::DEFAULT_TTL,
            refresh_interval: None,
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub json_logs: bool,
}

/// Configuration builder with fluent API
#[derive(Debug)]
pub struct ConfigBuilder {
    auth: VerifierConfig,
    discovery: RetryPolicy,
    jwks: JwksConfig,
    telemetry: TelemetryConfig,
}

impl ConfigBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            auth: VerifierConfig::new(),
            discovery: RetryPolicy::new(RetryPolicy::DEFAULT_RETRIES, RetryPolicy::DEFAULT_DELAY),
            jwks: JwksConfig {
                cache_ttl: JwksCache::DEFAULT_TTL,
                refresh_interval: None,
            },
            telemetry: TelemetryConfig {
                log_level: String::new(),
                json_logs: false,
            },
        }
    }

    #[must_use]
    pub fn jwks_uri(mut self, uri: Url) -> Self {
        self.auth.jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn well_known_uri(mut self, uri: Url) -> Self {
        self.auth.well_known_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn issuer(mut self, issuer: String) -> Self {
        self.auth.issuer = Some(issuer);
        self
    }

    #[must_use]
    pub fn audience(mut self, audience: OneOrMany) -> Self {
        self.auth.audience = Some(audience);
        self
    }

    #[must_use]
    pub const fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.auth.algorithm = Some(algorithm);
        self
    }

    #[must_use]
    pub const fn discovery_retries(mut self, retries: NonZeroU32) -> Self {
        self.discovery.retries = retries;
        self
    }

    #[must_use]
    pub const fn discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery.delay = delay;
        self
    }

    #[must_use]
    pub const fn jwks_cache_ttl(mut self, ttl: Duration) -> Self {
        self.jwks.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub const fn jwks_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.jwks.refresh_interval = interval;
        self
    }

    #[must_use]
    pub fn log_level(mut self, level: String) -> Self {
        self.telemetry.log_level = level;
        self
    }

    #[must_use]
    pub const fn json_logs(mut self, enabled: bool) -> Self {
        self.telemetry.json_logs = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> crate::Result<Config> {
        self.auth.validate()?;

        let log_level = if self.telemetry.log_level.is_empty() {
            "info".to_string()
        } else {
            self.telemetry.log_level
        };

        // A zero interval would spin the refresh task
        let refresh_interval = self.jwks.refresh_interval.filter(|d| !d.is_zero());

        Ok(Config {
            auth: self.auth,
            discovery: self.discovery,
            jwks: JwksConfig {
                cache_ttl: self.jwks.cache_ttl,
                refresh_interval,
            },
            telemetry: TelemetryConfig {
                log_level,
                json_logs: self.telemetry.json_logs,
            },
        })
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
