//! Verification key resolution
//!
//! [`KeyResolver`] is the seam the verifier uses to obtain a decoding key for
//! a token. [`StaticKeyResolver`] serves one configured key; [`JwksCache`]
//! fetches a JWK Set and indexes it by `kid`.
//!
//! The cached key set is an immutable snapshot behind an [`ArcSwap`], so the
//! per-request read path takes no lock. Refreshes are single-flight: callers
//! that miss concurrently wait on one fetch instead of each hitting the
//! identity provider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Header};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::error::KeyResolutionError;

type Result<T> = std::result::Result<T, KeyResolutionError>;

/// Source of verification keys for incoming tokens
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve_key(&self, header: &Header) -> Result<DecodingKey>;
}

/// A single, statically configured verification key
#[derive(Clone)]
pub struct StaticKeyResolver {
    key: DecodingKey,
}

impl std::fmt::Debug for StaticKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticKeyResolver").finish_non_exhaustive()
    }
}

impl StaticKeyResolver {
    #[must_use]
    pub const fn new(key: DecodingKey) -> Self {
        Self { key }
    }

    pub fn from_rsa_pem(pem: &[u8]) -> Result<Self> {
        DecodingKey::from_rsa_pem(pem)
            .map(Self::new)
            .map_err(|e| KeyResolutionError::Parse(format!("Invalid RSA public key: {e}")))
    }

    pub fn from_ec_pem(pem: &[u8]) -> Result<Self> {
        DecodingKey::from_ec_pem(pem)
            .map(Self::new)
            .map_err(|e| KeyResolutionError::Parse(format!("Invalid EC public key: {e}")))
    }

    /// HMAC secret (testing/dev only)
    #[must_use]
    pub fn from_secret(secret: &[u8]) -> Self {
        Self::new(DecodingKey::from_secret(secret))
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve_key(&self, _header: &Header) -> Result<DecodingKey> {
        Ok(self.key.clone())
    }
}

/// JSON Web Key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key type (RSA, EC)
    pub kty: String,
    #[serde(default)]
    pub alg: Option<String>,
    /// Key usage
    #[serde(default)]
    pub r#use: Option<String>,
    // RSA components
    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    // EC components
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

/// JSON Web Key Set
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

#[derive(Clone)]
struct JwkEntry {
    key: DecodingKey,
    algorithm: Algorithm,
}

impl std::fmt::Debug for JwkEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkEntry")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Immutable snapshot of a fetched key set
#[derive(Debug, Default)]
struct KeySet {
    named: HashMap<String, JwkEntry>,
    unnamed: Vec<JwkEntry>,
    fetched_at: Option<Instant>,
    generation: u64,
}

impl KeySet {
    fn from_jwks(jwks: JwkSet, generation: u64) -> Self {
        let mut named = HashMap::new();
        let mut unnamed = Vec::new();

        for jwk in jwks.keys {
            if jwk.r#use.as_deref().is_some_and(|u| u != "sig") {
                continue;
            }
            match decode_jwk(&jwk) {
                Ok(Some((key, algorithm))) => {
                    let entry = JwkEntry { key, algorithm };
                    match jwk.kid {
                        Some(kid) => {
                            named.insert(kid, entry);
                        }
                        None => unnamed.push(entry),
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(kid = ?jwk.kid, error = %e, "Skipping unusable JWK");
                }
            }
        }

        Self {
            named,
            unnamed,
            fetched_at: Some(Instant::now()),
            generation,
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.is_none_or(|t| t.elapsed() >= ttl)
    }

    fn find(&self, kid: Option<&str>, alg: Algorithm) -> Option<DecodingKey> {
        if let Some(kid) = kid {
            return self
                .named
                .get(kid)
                .filter(|entry| entry.algorithm == alg)
                .map(|entry| entry.key.clone());
        }

        self.unnamed
            .iter()
            .chain(self.named.values())
            .find(|entry| entry.algorithm == alg)
            .map(|entry| entry.key.clone())
    }

    fn len(&self) -> usize {
        self.named.len() + self.unnamed.len()
    }
}

/// Thread-safe JWKS cache
pub struct JwksCache {
    jwks_uri: Url,
    client: reqwest::Client,
    ttl: Duration,
    miss_cooldown: Duration,
    keys: ArcSwap<KeySet>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri)
            .field("ttl", &self.ttl)
            .field("miss_cooldown", &self.miss_cooldown)
            .field("keys_count", &self.keys.load().len())
            .finish_non_exhaustive()
    }
}

impl JwksCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

    /// Minimum age of the key set before an unknown `kid` may trigger a fetch
    pub const DEFAULT_MISS_COOLDOWN: Duration = Duration::from_secs(10);

    pub fn new(jwks_uri: Url, client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            jwks_uri,
            client,
            ttl,
            miss_cooldown: Self::DEFAULT_MISS_COOLDOWN,
            keys: ArcSwap::from_pointee(KeySet::default()),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn with_miss_cooldown(mut self, cooldown: Duration) -> Self {
        self.miss_cooldown = cooldown;
        self
    }

    pub const fn jwks_uri(&self) -> &Url {
        &self.jwks_uri
    }

    /// Get key for validation.
    ///
    /// A `kid` that is not in the current snapshot triggers one refresh
    /// before the lookup fails, unless the snapshot is younger than the miss
    /// cooldown. Tokens with made-up `kid`s therefore cost at most one fetch
    /// per cooldown window.
    pub async fn get_key(&self, kid: Option<&str>, alg: Algorithm) -> Result<DecodingKey> {
        let mut snapshot = self.keys.load_full();
        let mut refreshed = false;

        if snapshot.is_stale(self.ttl) {
            match self.refresh_after(snapshot.generation).await {
                Ok(fresh) => {
                    snapshot = fresh;
                    refreshed = true;
                }
                // Keep serving the previous key set while the IdP is unreachable
                Err(e) if snapshot.fetched_at.is_some() => {
                    tracing::warn!(error = %e, "JWKS refresh failed, using cached keys");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(key) = snapshot.find(kid, alg) {
            return Ok(key);
        }

        let cooling_down = snapshot
            .fetched_at
            .is_some_and(|t| t.elapsed() < self.miss_cooldown);

        if cooling_down {
            tracing::debug!(kid, "Key not in cached JWKS, refresh suppressed by cooldown");
        } else if !refreshed {
            tracing::debug!(kid, "Key not in cached JWKS, refreshing");
            snapshot = self.refresh_after(snapshot.generation).await?;
            if let Some(key) = snapshot.find(kid, alg) {
                return Ok(key);
            }
        }

        Err(kid.map_or(KeyResolutionError::NoMatchingKey, |kid| {
            KeyResolutionError::KeyNotFound(kid.to_string())
        }))
    }

    /// Refresh JWKS from remote
    pub async fn refresh(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.fetch_and_store().await.map(|_| ())
    }

    /// Refresh unless another caller already replaced snapshot `seen`
    async fn refresh_after(&self, seen: u64) -> Result<Arc<KeySet>> {
        let _guard = self.refresh_lock.lock().await;
        let current = self.keys.load_full();
        if current.generation != seen {
            return Ok(current);
        }
        self.fetch_and_store().await
    }

    async fn fetch_and_store(&self) -> Result<Arc<KeySet>> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Refreshing JWKS");

        let response = self.client.get(self.jwks_uri.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeyResolutionError::Status {
                url: self.jwks_uri.clone(),
                status,
            });
        }

        let jwks: JwkSet = response
            .json()
            .await
            .map_err(|e| KeyResolutionError::Parse(e.to_string()))?;

        let generation = self.keys.load().generation + 1;
        let snapshot = Arc::new(KeySet::from_jwks(jwks, generation));
        self.keys.store(Arc::clone(&snapshot));

        tracing::info!(
            jwks_uri = %self.jwks_uri,
            keys_count = snapshot.len(),
            "JWKS refreshed successfully"
        );

        Ok(snapshot)
    }

    #[cfg(test)]
    pub fn keys_count(&self) -> usize {
        self.keys.load().len()
    }
}

#[async_trait]
impl KeyResolver for JwksCache {
    async fn resolve_key(&self, header: &Header) -> Result<DecodingKey> {
        self.get_key(header.kid.as_deref(), header.alg).await
    }
}

fn decode_jwk(jwk: &Jwk) -> Result<Option<(DecodingKey, Algorithm)>> {
    let alg = match jwk.alg.as_deref() {
        Some("RS256") => Algorithm::RS256,
        Some("RS384") => Algorithm::RS384,
        Some("RS512") => Algorithm::RS512,
        Some("PS256") => Algorithm::PS256,
        Some("PS384") => Algorithm::PS384,
        Some("PS512") => Algorithm::PS512,
        Some("ES256") => Algorithm::ES256,
        Some("ES384") => Algorithm::ES384,
        None => {
            // Infer from key type
            match jwk.kty.as_str() {
                "RSA" => Algorithm::RS256,
                "EC" => match jwk.crv.as_deref() {
                    Some("P-256") => Algorithm::ES256,
                    Some("P-384") => Algorithm::ES384,
                    _ => return Ok(None),
                },
                _ => return Ok(None),
            }
        }
        Some(other) => {
            tracing::debug!(alg = other, "Skipping key with unsupported algorithm");
            return Ok(None);
        }
    };

    let key = match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk
                .n
                .as_ref()
                .ok_or_else(|| KeyResolutionError::Parse("Missing 'n' in RSA key".into()))?;
            let e = jwk
                .e
                .as_ref()
                .ok_or_else(|| KeyResolutionError::Parse("Missing 'e' in RSA key".into()))?;
            DecodingKey::from_rsa_components(n, e)
                .map_err(|e| KeyResolutionError::Parse(format!("Invalid RSA components: {e}")))?
        }
        "EC" => {
            let x = jwk
                .x
                .as_ref()
                .ok_or_else(|| KeyResolutionError::Parse("Missing 'x' in EC key".into()))?;
            let y = jwk
                .y
                .as_ref()
                .ok_or_else(|| KeyResolutionError::Parse("Missing 'y' in EC key".into()))?;
            DecodingKey::from_ec_components(x, y)
                .map_err(|e| KeyResolutionError::Parse(format!("Invalid EC components: {e}")))?
        }
        other => {
            tracing::debug!(kty = other, "Skipping unsupported key type");
            return Ok(None);
        }
    };

    Ok(Some((key, alg)))
}

/// Background JWKS refresh task builder
pub struct JwksRefreshTask {
    cache: Arc<JwksCache>,
    interval: Duration,
}

impl std::fmt::Debug for JwksRefreshTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksRefreshTask")
            .field("cache", &self.cache)
            .field("interval", &self.interval)
            .finish()
    }
}

impl JwksRefreshTask {
    #[must_use]
    pub const fn new(cache: Arc<JwksCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Spawn the refresh loop. A zero interval disables it.
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        if self.interval.is_zero() {
            tracing::warn!("JWKS refresh interval is zero, background refresh disabled");
            return tokio::spawn(async {});
        }

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick fires immediately; the factory already warmed the cache
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = self.cache.refresh().await {
                            tracing::warn!(error = %e, "Background JWKS refresh failed");
                        }
                    }
                    () = shutdown.cancelled() => {
                        tracing::debug!("JWKS refresh task shutting down");
                        break;
                    }
                }
            }
        })
    }
}
