//! Configuration management
//!
//! Supports configuration loading with precedence: env > file > defaults.
//! The CLI applies its flags on top of the loaded builder.

mod builder;
mod env;
mod file;

pub use builder::{Config, ConfigBuilder, JwksConfig, TelemetryConfig};

use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

use crate::Result;

/// Serialises tests that read or mutate process environment variables
#[cfg(test)]
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Load configuration with precedence: env > file > defaults
pub fn load_config() -> Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new();

    // Load from config file if exists
    if let Some(path) = file::find_config_file() {
        tracing::info!("Loading configuration from {}", path.display());
        builder = file::load_from_file(&path, builder)?;
    }

    // Override with environment variables
    builder = env::load_from_env(builder)?;

    Ok(builder)
}

/// Load configuration from a specific file path
pub fn load_config_from_path(path: &std::path::Path) -> Result<ConfigBuilder> {
    let mut builder = ConfigBuilder::new();

    // Load from specified file
    builder = file::load_from_file(path, builder)?;

    // Override with environment variables
    builder = env::load_from_env(builder)?;

    Ok(builder)
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| crate::Error::Config(format!("Invalid {name}: {e}")))
}

fn parse_delay(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| crate::Error::Config(format!("Invalid {name} {secs}: {e}")))
}

fn parse_algorithm(name: &str, value: &str) -> Result<Algorithm> {
    value
        .parse::<Algorithm>()
        .map_err(|_| crate::Error::Config(format!("Unsupported {name}: {value}")))
}
