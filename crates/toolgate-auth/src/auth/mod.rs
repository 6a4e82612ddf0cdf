//! Bearer token authentication
//!
//! Startup builds a [`TokenVerifier`] through [`VerifierFactory`], running
//! OIDC discovery when only a well-known URI is configured. Each request then
//! calls [`TokenVerifier::verify`], which resolves the signing key from the
//! cached JWKS, checks the signature and applies the claim gates in a fixed
//! order: expiry, issuer, audience.
//!
//! # Features
//!
//! - OIDC discovery with bounded, cancellable fixed-delay retry
//! - JWKS cache with lock-free reads and single-flight refresh on key-id miss
//! - Generous audience matching across string and array representations
//! - Optional axum middleware (`http` feature)

mod claims;
mod config;
mod discovery;
mod error;
mod factory;
mod jwks;
#[cfg(feature = "http")]
mod middleware;
mod policy;
#[cfg(test)]
mod test_support;
mod verifier;

pub use claims::{AccessToken, Claims, OneOrMany, UNKNOWN_CLIENT};
pub use config::{DEFAULT_ALGORITHM, VerifierConfig};
pub use discovery::{DiscoveryClient, DiscoveryDocument, RetryPolicy, resolve_jwks_and_issuer};
pub use error::{AuthError, DiscoveryError, FetchFailure, KeyResolutionError, Result};
pub use factory::{HTTP_TIMEOUT, VerifierFactory, build_verifier};
pub use jwks::{Jwk, JwkSet, JwksCache, JwksRefreshTask, KeyResolver, StaticKeyResolver};
#[cfg(feature = "http")]
pub use middleware::{AuthState, bearer_auth_middleware};
pub use policy::{ClaimPolicy, audience_matches};
pub use verifier::{RejectReason, Rejection, TokenVerifier, VerificationOutcome};
