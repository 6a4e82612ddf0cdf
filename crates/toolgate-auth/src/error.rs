use thiserror::Error;

use crate::auth::{AuthError, DiscoveryError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Discovery error: {0}")]
    Discovery(#[from] DiscoveryError),
}

impl Error {
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    #[must_use]
    pub const fn is_discovery(&self) -> bool {
        matches!(self, Self::Discovery(_))
    }
}

impl From<AuthError> for Error {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Config(msg) => Self::Config(msg),
            AuthError::Discovery(e) => Self::Discovery(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;

    #[test]
    fn test_config_predicate() {
        let err = Error::Config("invalid config".to_string());
        assert!(err.is_config());
        assert!(!err.is_discovery());
    }

    #[test]
    fn test_from_auth_config_error() {
        let err: Error = AuthError::Config("AUTH_JWKS_URI or AUTH_WELL_KNOWN_URI must be set".into()).into();
        assert!(err.is_config());
        assert!(err.to_string().starts_with("Configuration error"));
    }

    #[test]
    fn test_from_auth_discovery_error() {
        let inner = DiscoveryError::Cancelled {
            url: Url::parse("https://idp.example.com/.well-known/openid-configuration").unwrap(),
            attempts: 2,
        };
        let err: Error = AuthError::from(inner).into();
        assert!(err.is_discovery());
        assert!(err.to_string().contains("cancelled"));
    }
}
