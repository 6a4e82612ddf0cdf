//! Authentication error types

use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

/// Startup-time failures of the authentication stack.
///
/// Per-request verification never produces these; see
/// [`VerificationOutcome`](super::VerificationOutcome).
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

impl AuthError {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_discovery(&self) -> bool {
        matches!(self, Self::Discovery(_))
    }
}

/// Single failed attempt to fetch the discovery document
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("OIDC discovery from {url} failed after {attempts} attempt(s): {cause}")]
    Exhausted {
        url: Url,
        attempts: u32,
        #[source]
        cause: FetchFailure,
    },

    #[error("OIDC discovery from {url} cancelled after {attempts} attempt(s)")]
    Cancelled { url: Url, attempts: u32 },

    /// A 2xx response whose body is not a JSON object; never retried
    #[error("invalid OIDC discovery document from {url} on attempt {attempts}: {source}")]
    InvalidDocument {
        url: Url,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

impl DiscoveryError {
    /// Last underlying failure, if the retry loop ran to completion
    #[must_use]
    pub const fn cause(&self) -> Option<&FetchFailure> {
        match self {
            Self::Exhausted { cause, .. } => Some(cause),
            Self::Cancelled { .. } | Self::InvalidDocument { .. } => None,
        }
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts, .. }
            | Self::InvalidDocument { attempts, .. } => *attempts,
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

#[derive(Debug, Error)]
pub enum KeyResolutionError {
    #[error("JWKS fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("JWKS endpoint {url} returned HTTP {status}")]
    Status { url: Url, status: StatusCode },

    #[error("JWKS parse failed: {0}")]
    Parse(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("no matching key for algorithm")]
    NoMatchingKey,
}

pub type Result<T> = std::result::Result<T, AuthError>;
