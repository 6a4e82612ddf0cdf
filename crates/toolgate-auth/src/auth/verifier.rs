//! Bearer token verification
//!
//! [`TokenVerifier::verify`] never fails: every problem with the presented
//! token, from a garbage string to an unknown signing key, comes back as
//! [`VerificationOutcome::Rejected`] with a stable reason code.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, Validation, decode, decode_header};
use serde::Serialize;
use thiserror::Error;

use super::claims::{AccessToken, Claims};
use super::config::DEFAULT_ALGORITHM;
use super::jwks::KeyResolver;
use super::policy::ClaimPolicy;

/// Why a token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    InvalidSignature,
    MissingExp,
    Expired,
    IssuerMismatch,
    AudienceMismatch,
}

impl RejectReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidSignature => "invalid-signature",
            Self::MissingExp => "missing-exp",
            Self::Expired => "expired",
            Self::IssuerMismatch => "issuer-mismatch",
            Self::AudienceMismatch => "audience-mismatch",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{reason}: {detail}")]
pub struct Rejection {
    pub reason: RejectReason,
    /// Known once the signature has been verified
    pub client_id: Option<String>,
    pub detail: String,
}

impl Rejection {
    #[must_use]
    pub const fn new(reason: RejectReason, client_id: Option<String>, detail: String) -> Self {
        Self {
            reason,
            client_id,
            detail,
        }
    }

    fn invalid_signature(detail: impl fmt::Display) -> Self {
        Self::new(RejectReason::InvalidSignature, None, detail.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Accepted(AccessToken),
    Rejected(Rejection),
}

impl VerificationOutcome {
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    #[must_use]
    pub const fn access_token(&self) -> Option<&AccessToken> {
        match self {
            Self::Accepted(token) => Some(token),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub const fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Accepted(_) => None,
            Self::Rejected(rejection) => Some(rejection),
        }
    }

    pub fn into_result(self) -> Result<AccessToken, Rejection> {
        match self {
            Self::Accepted(token) => Ok(token),
            Self::Rejected(rejection) => Err(rejection),
        }
    }
}

/// Long-lived, shareable token verifier
pub struct TokenVerifier {
    resolver: Arc<dyn KeyResolver>,
    policy: ClaimPolicy,
    algorithm: Algorithm,
}

impl fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("policy", &self.policy)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    pub fn new(resolver: Arc<dyn KeyResolver>, policy: ClaimPolicy) -> Self {
        Self {
            resolver,
            policy,
            algorithm: DEFAULT_ALGORITHM,
        }
    }

    #[must_use]
    pub const fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub const fn policy(&self) -> &ClaimPolicy {
        &self.policy
    }

    /// Verify a raw bearer token
    pub async fn verify(&self, token: &str) -> VerificationOutcome {
        let outcome = match self.decode_claims(token).await {
            Ok(claims) => self.policy.evaluate(token, &claims, unix_now()),
            Err(rejection) => VerificationOutcome::Rejected(rejection),
        };

        match &outcome {
            VerificationOutcome::Accepted(access) => {
                tracing::info!(
                    client_id = %access.client_id,
                    scopes = ?access.scopes,
                    "Token verified"
                );
            }
            VerificationOutcome::Rejected(rejection) => {
                let client_id = rejection.client_id.as_deref().unwrap_or("unknown");
                tracing::warn!(
                    client_id,
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "Token rejected"
                );
                tracing::info!(client_id, "Authentication failed");
            }
        }

        outcome
    }

    async fn decode_claims(&self, token: &str) -> Result<Claims, Rejection> {
        let header = decode_header(token)
            .map_err(|e| Rejection::invalid_signature(format!("malformed token: {e}")))?;

        if header.alg != self.algorithm {
            return Err(Rejection::invalid_signature(format!(
                "algorithm {:?} not accepted, expected {:?}",
                header.alg, self.algorithm
            )));
        }

        let key = self
            .resolver
            .resolve_key(&header)
            .await
            .map_err(|e| Rejection::invalid_signature(format!("no verification key: {e}")))?;

        let data = decode::<Claims>(token, &key, &self.validation())
            .map_err(Rejection::invalid_signature)?;

        Ok(data.claims)
    }

    /// Signature only; claim gates run in [`ClaimPolicy::evaluate`]
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();
        validation
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}
