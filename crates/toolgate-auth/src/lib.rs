//! Bearer-token authentication for tool-server gateways

pub mod auth;
pub mod config;
mod error;
pub mod observability;

pub use auth::{
    AccessToken, ClaimPolicy, RejectReason, Rejection, TokenVerifier, VerificationOutcome,
    VerifierConfig, VerifierFactory, build_verifier,
};
pub use config::{Config, ConfigBuilder, JwksConfig, TelemetryConfig};
pub use error::{Error, Result};
