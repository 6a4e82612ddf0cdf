use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use toolgate_auth::auth::{
    DiscoveryClient, HTTP_TIMEOUT, OneOrMany, VerificationOutcome, resolve_jwks_and_issuer,
};
use toolgate_auth::config::{self, Config};
use toolgate_auth::observability::init_observability;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "toolgate-auth")]
#[command(about = "Bearer-token verification for tool-server gateways", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable JSON logging output
    #[arg(long, global = true)]
    json_logs: bool,

    /// JWKS endpoint (skips discovery)
    #[arg(long, global = true)]
    jwks_uri: Option<Url>,

    /// OIDC discovery document URL
    #[arg(long, global = true)]
    well_known_uri: Option<Url>,

    /// Expected token issuer
    #[arg(long, global = true)]
    issuer: Option<String>,

    /// Expected audience (comma-separated)
    #[arg(long, global = true)]
    audience: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run OIDC discovery and print the resolved JWKS URI and issuer
    Discover,
    /// Verify a bearer token and print the outcome as JSON
    Verify {
        /// Raw token, or `-` to read it from stdin
        token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Load configuration with precedence: env > file > defaults
    let mut builder = if let Some(ref path) = args.config {
        config::load_config_from_path(path)?
    } else {
        config::load_config()?
    };

    // CLI flags override env/file when given
    if let Some(uri) = args.jwks_uri {
        builder = builder.jwks_uri(uri);
    }
    if let Some(uri) = args.well_known_uri {
        builder = builder.well_known_uri(uri);
    }
    if let Some(issuer) = args.issuer {
        builder = builder.issuer(issuer);
    }
    if let Some(audience) = args.audience.as_deref().and_then(OneOrMany::from_delimited) {
        builder = builder.audience(audience);
    }
    if args.verbose {
        builder = builder.log_level("debug".to_string());
    }
    if args.json_logs {
        builder = builder.json_logs(true);
    }

    let config = builder.build()?;

    init_observability(&config.telemetry)?;

    // Ctrl+C aborts a discovery retry loop instead of waiting it out
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            signal_token.cancel();
        }
    });

    let result = match args.command {
        Command::Discover => discover(&config, &shutdown).await,
        Command::Verify { token } => verify(&config, &token, &shutdown).await,
    };

    shutdown.cancel();
    result
}

async fn discover(config: &Config, shutdown: &CancellationToken) -> anyhow::Result<ExitCode> {
    let Some(well_known) = &config.auth.well_known_uri else {
        anyhow::bail!("discover requires AUTH_WELL_KNOWN_URI (or --well-known-uri)");
    };

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let document = DiscoveryClient::new(http)
        .fetch_document(well_known, &config.discovery, shutdown)
        .await?;
    let (jwks_uri, issuer) = resolve_jwks_and_issuer(&document)?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "well_known_uri": well_known,
            "jwks_uri": jwks_uri,
            "issuer": issuer,
        }))?
    );

    Ok(ExitCode::SUCCESS)
}

async fn verify(
    config: &Config,
    token: &str,
    shutdown: &CancellationToken,
) -> anyhow::Result<ExitCode> {
    let token = if token == "-" {
        let mut buf = String::new();
        tokio::io::stdin()
            .read_to_string(&mut buf)
            .await
            .context("Failed to read token from stdin")?;
        buf.trim().to_string()
    } else {
        token.to_string()
    };

    let verifier = config
        .verifier_factory()
        .cancellation(shutdown.clone())
        .build()
        .await?;

    let (report, code) = match verifier.verify(&token).await {
        VerificationOutcome::Accepted(access) => (
            json!({ "accepted": true, "access_token": access }),
            ExitCode::SUCCESS,
        ),
        VerificationOutcome::Rejected(rejection) => (
            json!({ "accepted": false, "rejection": rejection }),
            ExitCode::FAILURE,
        ),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(code)
}
