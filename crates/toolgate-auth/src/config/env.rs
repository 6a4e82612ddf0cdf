//! Environment variable loading for configuration

use std::env;
use std::num::NonZeroU32;
use std::time::Duration;

use super::builder::ConfigBuilder;
use super::{parse_algorithm, parse_delay, parse_url};
use crate::Result;
use crate::auth::OneOrMany;

/// Environment variable names
mod vars {
    pub const AUTH_JWKS_URI: &str = "AUTH_JWKS_URI";
    pub const AUTH_WELL_KNOWN_URI: &str = "AUTH_WELL_KNOWN_URI";
    pub const AUTH_AUDIENCE: &str = "AUTH_AUDIENCE";
    pub const AUTH_ISSUER: &str = "AUTH_ISSUER";
    pub const AUTH_ALGORITHM: &str = "AUTH_ALGORITHM";
    pub const AUTH_DISCOVERY_RETRIES: &str = "AUTH_DISCOVERY_RETRIES";
    pub const AUTH_DISCOVERY_DELAY_SECS: &str = "AUTH_DISCOVERY_DELAY_SECS";
    pub const AUTH_JWKS_CACHE_TTL_SECS: &str = "AUTH_JWKS_CACHE_TTL_SECS";
    pub const AUTH_JWKS_REFRESH_INTERVAL_SECS: &str = "AUTH_JWKS_REFRESH_INTERVAL_SECS";
    pub const RUST_LOG: &str = "RUST_LOG";
    pub const TOOLGATE_JSON_LOGS: &str = "TOOLGATE_JSON_LOGS";
}

/// Load configuration from environment variables
///
/// Empty values count as unset.
pub fn load_from_env(mut builder: ConfigBuilder) -> Result<ConfigBuilder> {
    if let Some(uri) = non_empty(vars::AUTH_JWKS_URI) {
        builder = builder.jwks_uri(parse_url(vars::AUTH_JWKS_URI, &uri)?);
    }

    if let Some(uri) = non_empty(vars::AUTH_WELL_KNOWN_URI) {
        builder = builder.well_known_uri(parse_url(vars::AUTH_WELL_KNOWN_URI, &uri)?);
    }

    if let Some(issuer) = non_empty(vars::AUTH_ISSUER) {
        builder = builder.issuer(issuer);
    }

    // Comma-separated; a single value stays a plain string
    if let Some(audience) = non_empty(vars::AUTH_AUDIENCE)
        .as_deref()
        .and_then(OneOrMany::from_delimited)
    {
        builder = builder.audience(audience);
    }

    if let Some(alg) = non_empty(vars::AUTH_ALGORITHM) {
        builder = builder.algorithm(parse_algorithm(vars::AUTH_ALGORITHM, &alg)?);
    }

    // Discovery retry schedule
    if let Some(retries_str) = non_empty(vars::AUTH_DISCOVERY_RETRIES)
        && let Ok(retries) = retries_str.parse::<u32>()
        && let Some(nz) = NonZeroU32::new(retries)
    {
        builder = builder.discovery_retries(nz);
    }

    if let Some(delay_str) = non_empty(vars::AUTH_DISCOVERY_DELAY_SECS) {
        let secs = delay_str.parse::<f64>().map_err(|e| {
            crate::Error::Config(format!(
                "Invalid {}: {e}",
                vars::AUTH_DISCOVERY_DELAY_SECS
            ))
        })?;
        builder = builder.discovery_delay(parse_delay(vars::AUTH_DISCOVERY_DELAY_SECS, secs)?);
    }

    // JWKS cache
    if let Some(ttl_str) = non_empty(vars::AUTH_JWKS_CACHE_TTL_SECS)
        && let Ok(secs) = ttl_str.parse::<u64>()
    {
        builder = builder.jwks_cache_ttl(Duration::from_secs(secs));
    }

    if let Some(interval_str) = non_empty(vars::AUTH_JWKS_REFRESH_INTERVAL_SECS)
        && let Ok(secs) = interval_str.parse::<u64>()
    {
        builder = builder.jwks_refresh_interval(Some(Duration::from_secs(secs)));
    }

    // Telemetry
    if let Some(level) = non_empty(vars::RUST_LOG) {
        builder = builder.log_level(level);
    }

    if let Ok(val) = env::var(vars::TOOLGATE_JSON_LOGS) {
        builder = builder.json_logs(parse_bool(&val));
    }

    Ok(builder)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::Algorithm;

    use super::super::ENV_MUTEX;
    use super::*;

    const ALL_VARS: &[&str] = &[
        vars::AUTH_JWKS_URI,
        vars::AUTH_WELL_KNOWN_URI,
        vars::AUTH_AUDIENCE,
        vars::AUTH_ISSUER,
        vars::AUTH_ALGORITHM,
        vars::AUTH_DISCOVERY_RETRIES,
        vars::AUTH_DISCOVERY_DELAY_SECS,
        vars::AUTH_JWKS_CACHE_TTL_SECS,
        vars::AUTH_JWKS_REFRESH_INTERVAL_SECS,
        vars::RUST_LOG,
        vars::TOOLGATE_JSON_LOGS,
    ];

    /// Run `f` with exactly `vars` set among the variables this module reads
    fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _guard = ENV_MUTEX.lock().unwrap();

        let old_values: Vec<_> = ALL_VARS.iter().map(|k| (*k, env::var(k).ok())).collect();

        for key in ALL_VARS {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::remove_var(key) };
        }
        for (key, value) in vars {
            // SAFETY: We hold a mutex lock to ensure no concurrent modifications
            unsafe { env::set_var(key, value) };
        }

        let result = f();

        for (key, old_value) in old_values {
            match old_value {
                // SAFETY: We hold a mutex lock to ensure no concurrent modifications
                Some(v) => unsafe { env::set_var(key, v) },
                None => unsafe { env::remove_var(key) },
            }
        }

        result
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(parse_bool("yes"));
        assert!(parse_bool("on"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_load_jwks_uri() {
        with_env_vars(
            &[("AUTH_JWKS_URI", "https://idp.example.com/jwks")],
            || {
                let config = load_from_env(ConfigBuilder::new())
                    .unwrap()
                    .build()
                    .expect("Should build with a JWKS URI");
                assert_eq!(
                    config.auth.jwks_uri.unwrap().as_str(),
                    "https://idp.example.com/jwks"
                );
                assert!(config.auth.issuer.is_none());
            },
        );
    }

    #[test]
    fn test_load_invalid_url() {
        with_env_vars(&[("AUTH_WELL_KNOWN_URI", "not a valid url")], || {
            let err = load_from_env(ConfigBuilder::new()).unwrap_err();
            assert!(err.is_config());
            assert!(err.to_string().contains("AUTH_WELL_KNOWN_URI"));
        });
    }

    #[test]
    fn test_load_well_known_with_claims() {
        with_env_vars(
            &[
                (
                    "AUTH_WELL_KNOWN_URI",
                    "https://idp.example.com/.well-known/openid-configuration",
                ),
                ("AUTH_ISSUER", "https://idp.example.com"),
                ("AUTH_AUDIENCE", "api, web"),
                ("AUTH_ALGORITHM", "ES256"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert!(config.auth.needs_discovery());
                assert_eq!(config.auth.issuer.as_deref(), Some("https://idp.example.com"));
                assert_eq!(
                    config.auth.audience,
                    Some(OneOrMany::Many(vec!["api".into(), "web".into()]))
                );
                assert_eq!(config.auth.algorithm(), Algorithm::ES256);
            },
        );
    }

    #[test]
    fn test_single_audience_stays_string() {
        with_env_vars(
            &[
                ("AUTH_JWKS_URI", "https://idp.example.com/jwks"),
                ("AUTH_AUDIENCE", "api"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.auth.audience, Some(OneOrMany::from("api")));
            },
        );
    }

    #[test]
    fn test_empty_values_are_unset() {
        with_env_vars(
            &[
                ("AUTH_JWKS_URI", "https://idp.example.com/jwks"),
                ("AUTH_ISSUER", ""),
                ("AUTH_AUDIENCE", " , "),
                ("AUTH_WELL_KNOWN_URI", "  "),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert!(config.auth.issuer.is_none());
                assert!(config.auth.audience.is_none());
                assert!(config.auth.well_known_uri.is_none());
            },
        );
    }

    #[test]
    fn test_invalid_algorithm() {
        with_env_vars(&[("AUTH_ALGORITHM", "XYZ512")], || {
            let err = load_from_env(ConfigBuilder::new()).unwrap_err();
            assert!(err.to_string().contains("AUTH_ALGORITHM"));
        });
    }

    #[test]
    fn test_load_discovery_schedule() {
        with_env_vars(
            &[
                ("AUTH_JWKS_URI", "https://idp.example.com/jwks"),
                ("AUTH_DISCOVERY_RETRIES", "3"),
                ("AUTH_DISCOVERY_DELAY_SECS", "0.25"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.discovery.retries.get(), 3);
                assert_eq!(config.discovery.delay, Duration::from_millis(250));
            },
        );
    }

    #[test]
    fn test_zero_retries_ignored() {
        with_env_vars(
            &[
                ("AUTH_JWKS_URI", "https://idp.example.com/jwks"),
                ("AUTH_DISCOVERY_RETRIES", "0"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.discovery.retries.get(), 10);
                assert_eq!(config.discovery.delay, Duration::from_secs(10));
            },
        );
    }

    #[test]
    fn test_invalid_discovery_delay_is_config_error() {
        for delay in ["-1", "1e30", "inf", "NaN", "soon"] {
            with_env_vars(&[("AUTH_DISCOVERY_DELAY_SECS", delay)], || {
                let err = load_from_env(ConfigBuilder::new()).unwrap_err();
                assert!(err.is_config(), "{delay}: {err}");
                assert!(err.to_string().contains("AUTH_DISCOVERY_DELAY_SECS"));
            });
        }
    }

    #[test]
    fn test_load_jwks_settings() {
        with_env_vars(
            &[
                ("AUTH_JWKS_URI", "https://idp.example.com/jwks"),
                ("AUTH_JWKS_CACHE_TTL_SECS", "120"),
                ("AUTH_JWKS_REFRESH_INTERVAL_SECS", "60"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.jwks.cache_ttl, Duration::from_secs(120));
                assert_eq!(config.jwks.refresh_interval, Some(Duration::from_secs(60)));
            },
        );
    }

    #[test]
    fn test_load_telemetry_config() {
        with_env_vars(
            &[
                ("AUTH_JWKS_URI", "https://idp.example.com/jwks"),
                ("RUST_LOG", "toolgate_auth=debug"),
                ("TOOLGATE_JSON_LOGS", "yes"),
            ],
            || {
                let config = load_from_env(ConfigBuilder::new()).unwrap().build().unwrap();
                assert_eq!(config.telemetry.log_level, "toolgate_auth=debug");
                assert!(config.telemetry.json_logs);
            },
        );
    }

    #[test]
    fn test_load_no_env_vars() {
        with_env_vars(&[], || {
            let builder = load_from_env(ConfigBuilder::new()).unwrap();
            assert!(builder.build().is_err());
        });
    }
}
