//! TOML configuration file loading

use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::builder::ConfigBuilder;
use super::{parse_algorithm, parse_delay, parse_url};
use crate::Result;
use crate::auth::OneOrMany;

/// Configuration file locations checked in order
const CONFIG_PATHS: &[&str] = &[
    "./toolgate-auth.toml",
    "~/.config/toolgate-auth/config.toml",
    "/etc/toolgate-auth/config.toml",
];

/// Find the first existing configuration file
pub fn find_config_file() -> Option<PathBuf> {
    for path_str in CONFIG_PATHS {
        let path = if path_str.starts_with('~') {
            if let Ok(home) = std::env::var("HOME") {
                PathBuf::from(path_str.replacen('~', &home, 1))
            } else {
                continue;
            }
        } else {
            PathBuf::from(path_str)
        };

        if path.exists() {
            return Some(path);
        }
    }
    None
}

/// Load configuration from a TOML file
pub fn load_from_file(path: &Path, builder: ConfigBuilder) -> Result<ConfigBuilder> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read config file {}: {}",
            path.display(),
            e
        ))
    })?;

    let file_config: FileConfig = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse config file {}: {}",
            path.display(),
            e
        ))
    })?;

    apply_file_config(builder, file_config)
}

fn apply_file_config(mut builder: ConfigBuilder, config: FileConfig) -> Result<ConfigBuilder> {
    if let Some(auth) = config.auth {
        if let Some(uri) = auth.jwks_uri {
            builder = builder.jwks_uri(parse_url("jwks_uri", &uri)?);
        }

        if let Some(uri) = auth.well_known_uri {
            builder = builder.well_known_uri(parse_url("well_known_uri", &uri)?);
        }

        if let Some(issuer) = auth.issuer {
            builder = builder.issuer(issuer);
        }

        if let Some(audience) = auth.audience {
            builder = builder.audience(audience);
        }

        if let Some(alg) = auth.algorithm {
            builder = builder.algorithm(parse_algorithm("algorithm", &alg)?);
        }
    }

    if let Some(discovery) = config.discovery {
        if let Some(retries) = discovery.retries
            && let Some(nz) = NonZeroU32::new(retries)
        {
            builder = builder.discovery_retries(nz);
        }

        if let Some(delay) = discovery.delay_secs {
            builder = builder.discovery_delay(parse_delay("discovery.delay_secs", delay)?);
        }
    }

    if let Some(jwks) = config.jwks {
        if let Some(ttl) = jwks.cache_ttl_secs {
            builder = builder.jwks_cache_ttl(Duration::from_secs(ttl));
        }

        if let Some(interval) = jwks.refresh_interval_secs {
            builder = builder.jwks_refresh_interval(Some(Duration::from_secs(interval)));
        }
    }

    if let Some(obs) = config.observability {
        if let Some(level) = obs.log_level {
            builder = builder.log_level(level);
        }

        if let Some(json) = obs.json_logs {
            builder = builder.json_logs(json);
        }
    }

    Ok(builder)
}

/// Root configuration file structure
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    auth: Option<AuthFileConfig>,
    discovery: Option<DiscoveryFileConfig>,
    jwks: Option<JwksFileConfig>,
    observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Deserialize)]
struct AuthFileConfig {
    jwks_uri: Option<String>,
    well_known_uri: Option<String>,
    issuer: Option<String>,
    audience: Option<OneOrMany>,
    algorithm: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryFileConfig {
    retries: Option<u32>,
    delay_secs: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct JwksFileConfig {
    cache_ttl_secs: Option<u64>,
    refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ObservabilityConfig {
    log_level: Option<String>,
    json_logs: Option<bool>,
}
