//! Gateway configuration: base URL resolution and transport knobs.
//!
//! The base URL is resolved once, when the config is built, from (in order)
//! a config file, the environment, and the fixed local fallback. Server-side
//! execution may use a different URL than browser-facing execution.
//!
//! # File format
//!
//! ```yaml
//! # gateway.yaml
//! base_url: "https://cms.example.com/api/v1"
//! context: browser   # or: server
//! timeout_ms: 15000
//! user_agent: "polaris-admin/1.0"
//! ```
//!
//! The same keys are accepted in a `.toml` file.

use std::path::Path;

use polaris_gateway_core::wire::{DEFAULT_BASE_URL, PUBLIC_API_URL_ENV, SERVER_API_URL_ENV};
use serde::{Deserialize, Serialize};
use url::Url;

/// Errors produced while loading or validating a [`GatewayConfig`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// Reading the config file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML parsing failure.
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),

    /// TOML parsing failure.
    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    /// The base URL is not an absolute `http`/`https` URL.
    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The config file extension is neither YAML nor TOML.
    #[error("unsupported config file '{path}'; expected .yaml, .yml or .toml")]
    UnsupportedFormat {
        /// The offending path.
        path: String,
    },
}

/// Where the gateway runs.
///
/// Server-side rendering has no cookie store, so CSRF companions are never
/// available there and attachment is skipped without error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionContext {
    /// Server rendering: no readable cookies.
    Server,
    /// Client execution with a cookie store.
    #[default]
    Browser,
}

impl ExecutionContext {
    /// Whether this context has a readable cookie store.
    #[must_use]
    pub const fn has_cookie_store(self) -> bool {
        matches!(self, Self::Browser)
    }
}

/// Runtime configuration for a [`SessionClient`](crate::SessionClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Absolute base URL every endpoint is appended to. No trailing `/`.
    pub base_url: String,

    /// Execution context.
    pub context: ExecutionContext,

    /// Overall per-request timeout. `None` keeps the transport default.
    pub timeout_ms: Option<u64>,

    /// `User-Agent` sent with every request.
    pub user_agent: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            context: ExecutionContext::default(),
            timeout_ms: None,
            user_agent: None,
        }
    }
}

impl GatewayConfig {
    /// Resolve the config from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is invalid.
    pub fn from_env(context: ExecutionContext) -> Result<Self, ConfigError> {
        Self::from_lookup(context, |key| std::env::var(key).ok())
    }

    /// Resolve the config with a custom variable lookup.
    ///
    /// Server context reads the server URL, then the public URL; browser
    /// context reads only the public URL. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the resolved base URL is invalid.
    pub fn from_lookup<F>(context: ExecutionContext, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            context,
            ..Self::default()
        };
        config.with_env_overrides(lookup)
    }

    /// Load a YAML or TOML config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, has an
    /// unknown extension, or names an invalid base URL.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml_ng::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(ConfigError::UnsupportedFormat {
                    path: path.display().to_string(),
                })
            }
        };
        config.validated()
    }

    /// Override the base URL from environment variables, if set.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting base URL is invalid.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let from_env = match self.context {
            ExecutionContext::Server => {
                non_blank(SERVER_API_URL_ENV).or_else(|| non_blank(PUBLIC_API_URL_ENV))
            }
            ExecutionContext::Browser => non_blank(PUBLIC_API_URL_ENV),
        };
        if let Some(url) = from_env {
            self.base_url = url;
        }
        self.validated()
    }

    /// Replace the base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute `http`/`https` URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Result<Self, ConfigError> {
        self.base_url = base_url.into();
        self.validated()
    }

    /// Set the execution context.
    #[must_use]
    pub const fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        self.base_url = normalize_base_url(&self.base_url)?;
        Ok(self)
    }
}

fn normalize_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };
    let parsed = Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("must not contain a query or fragment".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn falls_back_to_local_default() {
        let config = GatewayConfig::from_lookup(ExecutionContext::Browser, lookup(&[])).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:5000/api/v1");
        assert_eq!(config.context, ExecutionContext::Browser);
    }

    #[test]
    fn server_prefers_server_url() {
        let vars = [
            (SERVER_API_URL_ENV, "http://backend:5000/api/v1"),
            (PUBLIC_API_URL_ENV, "https://cms.example.com/api/v1"),
        ];
        let server = GatewayConfig::from_lookup(ExecutionContext::Server, lookup(&vars)).unwrap();
        assert_eq!(server.base_url, "http://backend:5000/api/v1");

        let browser = GatewayConfig::from_lookup(ExecutionContext::Browser, lookup(&vars)).unwrap();
        assert_eq!(browser.base_url, "https://cms.example.com/api/v1");
    }

    #[test]
    fn server_falls_back_to_public_url() {
        let vars = [(PUBLIC_API_URL_ENV, "https://cms.example.com/api/v1")];
        let config = GatewayConfig::from_lookup(ExecutionContext::Server, lookup(&vars)).unwrap();
        assert_eq!(config.base_url, "https://cms.example.com/api/v1");
    }

    #[test]
    fn browser_ignores_server_url() {
        let vars = [(SERVER_API_URL_ENV, "http://backend:5000/api/v1")];
        let config = GatewayConfig::from_lookup(ExecutionContext::Browser, lookup(&vars)).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let vars = [(SERVER_API_URL_ENV, "  "), (PUBLIC_API_URL_ENV, "")];
        let config = GatewayConfig::from_lookup(ExecutionContext::Server, lookup(&vars)).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let config = GatewayConfig::default()
            .with_base_url("https://cms.example.com/api/v1/")
            .unwrap();
        assert_eq!(config.base_url, "https://cms.example.com/api/v1");
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        assert!(GatewayConfig::default().with_base_url("/api/v1").is_err());
        assert!(GatewayConfig::default().with_base_url("ftp://host/api").is_err());
        assert!(GatewayConfig::default()
            .with_base_url("http://host/api?x=1")
            .is_err());
    }

    #[test]
    fn deserialize_defaults() {
        let config: GatewayConfig = serde_yaml_ng::from_str("{}").unwrap();
        assert_eq!(config, GatewayConfig::default());
    }

    #[test]
    fn load_yaml_file() {
        let dir = std::env::temp_dir().join("polaris-gateway-config-yaml");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.yaml");
        std::fs::write(
            &path,
            indoc! {r#"
                base_url: "https://cms.example.com/api/v1/"
                context: server
                timeout_ms: 1500
            "#},
        )
        .unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "https://cms.example.com/api/v1");
        assert_eq!(config.context, ExecutionContext::Server);
        assert_eq!(config.timeout_ms, Some(1500));
        assert!(config.user_agent.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_toml_file() {
        let dir = std::env::temp_dir().join("polaris-gateway-config-toml");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.toml");
        std::fs::write(
            &path,
            indoc! {r#"
                base_url = "http://localhost:8080/api/v1"
                user_agent = "polaris-admin/1.0"
            "#},
        )
        .unwrap();

        let config = GatewayConfig::load(&path).unwrap();
        assert_eq!(config.base_url, "http://localhost:8080/api/v1");
        assert_eq!(config.context, ExecutionContext::Browser);
        assert_eq!(config.user_agent.as_deref(), Some("polaris-admin/1.0"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_rejects_unknown_extension() {
        let dir = std::env::temp_dir().join("polaris-gateway-config-ext");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("gateway.json");
        std::fs::write(&path, "{}").unwrap();

        let result = GatewayConfig::load(&path);
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat { .. })));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_nonexistent_file_returns_error() {
        let result = GatewayConfig::load(Path::new("/nonexistent/gateway.yaml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn env_overrides_file_values() {
        let config = GatewayConfig::default()
            .with_context(ExecutionContext::Server)
            .with_env_overrides(lookup(&[(SERVER_API_URL_ENV, "http://ssr:5000/api/v1")]))
            .unwrap();
        assert_eq!(config.base_url, "http://ssr:5000/api/v1");
    }

    #[test]
    fn only_browser_has_cookie_store() {
        assert!(ExecutionContext::Browser.has_cookie_store());
        assert!(!ExecutionContext::Server.has_cookie_store());
    }
}
