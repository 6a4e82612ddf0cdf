//! Verifier configuration

use jsonwebtoken::Algorithm;
use url::Url;

use super::claims::OneOrMany;
use super::error::{AuthError, Result};

/// Algorithm accepted when none is configured
pub const DEFAULT_ALGORITHM: Algorithm = Algorithm::RS256;

/// Immutable input to the verifier factory.
///
/// At least one of `jwks_uri` / `well_known_uri` must be set. When only the
/// well-known URI is present, discovery fills in the JWKS URI and, if unset,
/// the issuer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifierConfig {
    /// JWKS endpoint; skips discovery when set
    pub jwks_uri: Option<Url>,
    /// OIDC discovery document (`/.well-known/openid-configuration`)
    pub well_known_uri: Option<Url>,
    /// Expected `iss`; the issuer check is skipped when unset or empty
    pub issuer: Option<String>,
    /// Expected `aud`; the audience check is skipped when unset or empty
    pub audience: Option<OneOrMany>,
    /// Signing algorithm, [`DEFAULT_ALGORITHM`] when unset
    pub algorithm: Option<Algorithm>,
}

impl VerifierConfig {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            jwks_uri: None,
            well_known_uri: None,
            issuer: None,
            audience: None,
            algorithm: None,
        }
    }

    #[must_use]
    pub fn with_jwks_uri(mut self, uri: Url) -> Self {
        self.jwks_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn with_well_known_uri(mut self, uri: Url) -> Self {
        self.well_known_uri = Some(uri);
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: impl Into<OneOrMany>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = Some(algorithm);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwks_uri.is_none() && self.well_known_uri.is_none() {
            return Err(AuthError::Config(
                "AUTH_JWKS_URI or AUTH_WELL_KNOWN_URI must be set".into(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub const fn needs_discovery(&self) -> bool {
        self.jwks_uri.is_none() && self.well_known_uri.is_some()
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm.unwrap_or(DEFAULT_ALGORITHM)
    }
}
