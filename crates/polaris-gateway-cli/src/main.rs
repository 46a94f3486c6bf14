//! CLI for the Polaris session gateway.
//!
//! Issues one API call with the same CSRF handling and session recovery
//! the application uses, and prints the decoded JSON.
//!
//! # Subcommands
//!
//! ```text
//! # List contents, logging in first
//! polaris-gateway request GET /contents -p page=2 --login admin --password secret
//!
//! # Delete with an explicit base URL
//! polaris-gateway request DELETE /users/5 --base-url https://cms.example.com/api/v1
//!
//! # Show the resolved configuration
//! polaris-gateway config --config gateway.yaml --format json
//! ```
//!
//! Logs go to stderr and are filtered with `RUST_LOG`, e.g.
//! `RUST_LOG=polaris::gateway=debug`.

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use http::Method;
use polaris_gateway::api::LoginCredentials;
use polaris_gateway::{
    ExecutionContext, GatewayConfig, GatewayError, OutgoingCall, Payload, SessionClient,
};
use tracing_subscriber::EnvFilter;

/// Command-line client for the Polaris CMS API.
#[derive(Parser)]
#[command(name = "polaris-gateway", version, about)]
enum Cli {
    /// Send one request through the gateway and print the JSON response.
    ///
    /// An expired session is refreshed once and the request retried, exactly
    /// as the application does.
    Request(RequestArgs),

    /// Print the resolved gateway configuration.
    Config(ConfigArgs),
}

/// Options shared by every subcommand that builds a [`GatewayConfig`].
#[derive(Parser)]
struct ConfigSource {
    /// YAML or TOML config file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run in server context: no cookie store, no CSRF header.
    #[arg(long)]
    server: bool,

    /// Base URL, overriding both the file and the environment.
    #[arg(long)]
    base_url: Option<String>,
}

#[derive(Parser)]
struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE).
    method: String,

    /// Endpoint relative to the base URL, e.g. `/contents`.
    endpoint: String,

    /// Query parameter as `KEY=VALUE`. Repeatable.
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, String)>,

    /// Extra header as `NAME:VALUE`. Repeatable.
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// JSON request body.
    #[arg(short, long)]
    data: Option<String>,

    /// Log in as this user before sending the request.
    #[arg(long, requires = "password")]
    login: Option<String>,

    /// Password for `--login`.
    #[arg(long, requires = "login")]
    password: Option<String>,

    #[command(flatten)]
    source: ConfigSource,
}

#[derive(Parser)]
struct ConfigArgs {
    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Yaml)]
    format: Format,

    #[command(flatten)]
    source: ConfigSource,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Yaml,
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse() {
        Cli::Request(args) => run_request(args).await,
        Cli::Config(args) => run_config(&args).map(|()| ExitCode::SUCCESS),
    }
}

async fn run_request(args: RequestArgs) -> anyhow::Result<ExitCode> {
    let config = resolve_config(&args.source)?;
    let call = build_call(&args)?;
    let client = SessionClient::new(config).context("failed to build HTTP client")?;

    if let (Some(username), Some(password)) = (args.login, args.password) {
        let credentials = LoginCredentials { username, password };
        if let Err(err) = client.auth().login(&credentials).await {
            print_error(&err)?;
            return Ok(ExitCode::FAILURE);
        }
        tracing::info!(user = %credentials.username, "logged in");
    }

    match client.send(call).await {
        Ok(response) => {
            tracing::info!(status = response.status.as_u16(), "request succeeded");
            if let Payload::Json(value) = response.payload {
                println!("{}", serde_json::to_string_pretty(&value)?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            print_error(&err)?;
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_config(args: &ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args.source)?;
    let rendered = match args.format {
        Format::Yaml => serde_yaml_ng::to_string(&config)?,
        Format::Json => serde_json::to_string_pretty(&config)? + "\n",
    };
    print!("{rendered}");
    Ok(())
}

/// File, then environment, then `--base-url`.
fn resolve_config(source: &ConfigSource) -> anyhow::Result<GatewayConfig> {
    let mut config = match &source.config {
        Some(path) => GatewayConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => GatewayConfig::default(),
    };
    if source.server {
        config = config.with_context(ExecutionContext::Server);
    }
    config = config
        .with_env_overrides(|key| std::env::var(key).ok())
        .context("invalid base URL in environment")?;
    if let Some(base_url) = &source.base_url {
        config = config.with_base_url(base_url.clone())?;
    }
    Ok(config)
}

fn build_call(args: &RequestArgs) -> anyhow::Result<OutgoingCall> {
    let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{}'", args.method))?;

    let mut call = OutgoingCall::new(method, args.endpoint.clone());
    for (key, value) in &args.params {
        call = call.param(key.clone(), value);
    }
    for (name, value) in &args.headers {
        call = call.header(name.clone(), value.clone());
    }
    if let Some(data) = &args.data {
        let body: serde_json::Value =
            serde_json::from_str(data).context("--data is not valid JSON")?;
        call = call.json(&body)?;
    }
    Ok(call)
}

fn print_error(err: &GatewayError) -> anyhow::Result<()> {
    let report = serde_json::json!({
        "kind": err.kind().to_string(),
        "message": err.message(),
        "status": err.status().map(|status| status.as_u16()),
        "errors": err.errors(),
    });
    eprintln!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn parse_param(raw: &str) -> anyhow::Result<(String, String)> {
    split_pair(raw, '=')
}

fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let (name, value) = split_pair(raw, ':')?;
    Ok((name, value.trim_start().to_string()))
}

fn split_pair(raw: &str, separator: char) -> anyhow::Result<(String, String)> {
    let Some((key, value)) = raw.split_once(separator) else {
        bail!("expected KEY{separator}VALUE, got '{raw}'");
    };
    if key.trim().is_empty() {
        bail!("empty key in '{raw}'");
    }
    Ok((key.trim().to_string(), value.to_string()))
}
