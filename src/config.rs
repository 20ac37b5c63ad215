//! Configuration management for llm-failover
//!
//! Configuration comes from either a TOML file or environment variables and is
//! validated once at startup. The validated `Config` produces an immutable
//! `FailoverPolicy` that is shared read-only by every request.

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Model used on the primary endpoint when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// At most one switch per logical request
pub const DEFAULT_MAX_FAILOVER_ATTEMPTS: u32 = 1;

/// Per-attempt timeout used when none is configured
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Upper bound for the per-attempt timeout
pub const MAX_REQUEST_TIMEOUT_SECONDS: u64 = 300;

/// Environment variable names read by `Config::from_env`
pub mod env {
    pub const PRIMARY_BASE_URL: &str = "PRIMARY_BASE_URL";
    pub const PRIMARY_API_KEY: &str = "PRIMARY_API_KEY";
    pub const PRIMARY_MODEL: &str = "PRIMARY_MODEL";
    pub const FALLBACK_BASE_URL: &str = "FALLBACK_BASE_URL";
    pub const FALLBACK_API_KEY: &str = "FALLBACK_API_KEY";
    pub const FALLBACK_MODEL: &str = "FALLBACK_MODEL";
    pub const MAX_FAILOVER_ATTEMPTS: &str = "MAX_FAILOVER_ATTEMPTS";
    pub const REQUEST_TIMEOUT_SECONDS: &str = "REQUEST_TIMEOUT_SECONDS";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const SERVER_HOST: &str = "SERVER_HOST";
    pub const SERVER_PORT: &str = "SERVER_PORT";
}

/// A credential that never appears in `Debug` or `Display` output
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the actual value. Only the request executor should call this.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// True if the secret is empty or whitespace-only
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One provider endpoint
///
/// Fields are private so a validated endpoint cannot be mutated afterwards.
/// Construct through `EndpointConfig::new` or deserialization followed by
/// `Config::validate()`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EndpointConfig {
    base_url: String,
    api_key: SecretString,
    #[serde(alias = "model", default = "default_model")]
    model_id: String,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

impl EndpointConfig {
    /// Create a validated endpoint
    ///
    /// # Errors
    /// Returns `AppError::Config` if the base URL is not an absolute http(s)
    /// URL, or if the credential or model id is blank.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<SecretString>,
        model_id: impl Into<String>,
    ) -> AppResult<Self> {
        let endpoint = Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model_id: model_id.into(),
        };
        endpoint.validate("endpoint")?;
        Ok(endpoint)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// OpenAI-compatible chat completions URL for this endpoint
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn validate(&self, section: &str) -> AppResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{}.base_url must not be empty",
                section
            )));
        }

        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            AppError::Config(format!(
                "{}.base_url '{}' is not a valid URL: {}",
                section, self.base_url, e
            ))
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AppError::Config(format!(
                "{}.base_url '{}' must start with 'http://' or 'https://'",
                section, self.base_url
            )));
        }

        if url.host_str().is_none() {
            return Err(AppError::Config(format!(
                "{}.base_url '{}' has no host",
                section, self.base_url
            )));
        }

        if self.api_key.is_blank() {
            return Err(AppError::Config(format!(
                "{}.api_key must not be empty",
                section
            )));
        }

        if self.model_id.trim().is_empty() {
            return Err(AppError::Config(format!(
                "{}.model_id must not be empty",
                section
            )));
        }

        Ok(())
    }
}

/// Immutable failover policy shared by all requests
///
/// Built once at startup. Nothing in the request path can mutate it, so
/// concurrent readers need no synchronization beyond the `Arc` it lives in.
#[derive(Debug, Clone)]
pub struct FailoverPolicy {
    primary: EndpointConfig,
    fallback: Option<EndpointConfig>,
    max_failover_attempts: u32,
    request_timeout: Duration,
}

impl FailoverPolicy {
    /// Create a policy with the default attempt limit and timeout
    pub fn new(primary: EndpointConfig, fallback: Option<EndpointConfig>) -> Self {
        Self {
            primary,
            fallback,
            max_failover_attempts: DEFAULT_MAX_FAILOVER_ATTEMPTS,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS),
        }
    }

    /// Set the number of switches allowed per request (0 or 1)
    pub fn with_max_failover_attempts(mut self, attempts: u32) -> AppResult<Self> {
        validate_max_failover_attempts(attempts)?;
        self.max_failover_attempts = attempts;
        Ok(self)
    }

    /// Set the per-attempt timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> AppResult<Self> {
        if timeout.is_zero() {
            return Err(AppError::Config(
                "request timeout must be greater than 0".to_string(),
            ));
        }
        if timeout > Duration::from_secs(MAX_REQUEST_TIMEOUT_SECONDS) {
            return Err(AppError::Config(format!(
                "request timeout cannot exceed {} seconds, got {:?}",
                MAX_REQUEST_TIMEOUT_SECONDS, timeout
            )));
        }
        self.request_timeout = timeout;
        Ok(self)
    }

    pub fn primary(&self) -> &EndpointConfig {
        &self.primary
    }

    pub fn fallback(&self) -> Option<&EndpointConfig> {
        self.fallback.as_ref()
    }

    pub fn max_failover_attempts(&self) -> u32 {
        self.max_failover_attempts
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// True if a failure on the primary can ever be retried
    pub fn failover_enabled(&self) -> bool {
        self.fallback.is_some() && self.max_failover_attempts > 0
    }
}

fn validate_max_failover_attempts(attempts: u32) -> AppResult<()> {
    if attempts > DEFAULT_MAX_FAILOVER_ATTEMPTS {
        return Err(AppError::Config(format!(
            "max_failover_attempts must be 0 or 1, got {}. \
            Switching back to the primary after a fallback failure is not supported.",
            attempts
        )));
    }
    Ok(())
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub primary: EndpointConfig,
    #[serde(default)]
    pub fallback: Option<EndpointConfig>,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP dispatch server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Address to bind; `host` must be an IP literal
    pub fn socket_addr(&self) -> AppResult<SocketAddr> {
        let ip = self.host.trim().parse::<IpAddr>().map_err(|_| {
            AppError::Config(format!(
                "server.host '{}' is not an IP address (use 127.0.0.1 or 0.0.0.0)",
                self.host
            ))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Failover tuning
#[derive(Debug, Clone, Deserialize)]
pub struct FailoverConfig {
    #[serde(default = "default_max_failover_attempts")]
    pub max_failover_attempts: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            max_failover_attempts: default_max_failover_attempts(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_max_failover_attempts() -> u32 {
    DEFAULT_MAX_FAILOVER_ATTEMPTS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from process environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    ///
    /// Blank values are treated as absent. A fallback base URL without a
    /// fallback credential is a startup error; a fallback credential without a
    /// base URL is ignored with a warning.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let primary_model = get(env::PRIMARY_MODEL).unwrap_or_else(default_model);
        let primary = EndpointConfig {
            base_url: get(env::PRIMARY_BASE_URL).ok_or(AppError::MissingEnv(env::PRIMARY_BASE_URL))?,
            api_key: get(env::PRIMARY_API_KEY)
                .ok_or(AppError::MissingEnv(env::PRIMARY_API_KEY))?
                .into(),
            model_id: primary_model.clone(),
        };

        let fallback = match get(env::FALLBACK_BASE_URL) {
            Some(base_url) => Some(EndpointConfig {
                base_url,
                api_key: get(env::FALLBACK_API_KEY)
                    .ok_or(AppError::MissingEnv(env::FALLBACK_API_KEY))?
                    .into(),
                model_id: get(env::FALLBACK_MODEL).unwrap_or(primary_model),
            }),
            None => {
                if get(env::FALLBACK_API_KEY).is_some() {
                    tracing::warn!(
                        "{} is set but {} is not; failover is disabled",
                        env::FALLBACK_API_KEY,
                        env::FALLBACK_BASE_URL
                    );
                }
                None
            }
        };

        let failover = FailoverConfig {
            max_failover_attempts: parse_number(&get, env::MAX_FAILOVER_ATTEMPTS)?
                .unwrap_or_else(default_max_failover_attempts),
            request_timeout_seconds: parse_number(&get, env::REQUEST_TIMEOUT_SECONDS)?
                .unwrap_or_else(default_request_timeout),
        };

        let server = ServerConfig {
            host: get(env::SERVER_HOST).unwrap_or_else(default_host),
            port: parse_number(&get, env::SERVER_PORT)?.unwrap_or_else(default_port),
        };

        let config = Self {
            server,
            primary,
            fallback,
            failover,
            observability: ObservabilityConfig {
                log_level: get(env::LOG_LEVEL).unwrap_or_else(default_log_level),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called automatically by `from_file()`, `from_str()` and `from_lookup()`.
    /// Misconfiguration is fatal at startup, never discovered per request.
    pub fn validate(&self) -> AppResult<()> {
        self.server.socket_addr()?;
        self.primary.validate("primary")?;
        if let Some(fallback) = &self.fallback {
            fallback.validate("fallback")?;
        }

        validate_max_failover_attempts(self.failover.max_failover_attempts)?;

        if self.failover.request_timeout_seconds == 0 {
            return Err(AppError::Config(
                "request_timeout_seconds must be greater than 0".to_string(),
            ));
        }
        if self.failover.request_timeout_seconds > MAX_REQUEST_TIMEOUT_SECONDS {
            return Err(AppError::Config(format!(
                "request_timeout_seconds cannot exceed {} seconds (5 minutes), got {}",
                MAX_REQUEST_TIMEOUT_SECONDS, self.failover.request_timeout_seconds
            )));
        }

        if self.fallback.is_some() && self.failover.max_failover_attempts == 0 {
            tracing::warn!("fallback endpoint configured but max_failover_attempts = 0; it will never be used");
        }

        Ok(())
    }

    /// Build the immutable policy consumed by the failover controller
    pub fn policy(&self) -> AppResult<FailoverPolicy> {
        FailoverPolicy::new(self.primary.clone(), self.fallback.clone())
            .with_max_failover_attempts(self.failover.max_failover_attempts)?
            .with_request_timeout(Duration::from_secs(self.failover.request_timeout_seconds))
    }
}

fn parse_number<T, G>(get: &G, key: &'static str) -> AppResult<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| {
                AppError::Config(format!("{} has invalid value '{}': {}", key, raw, e))
            })
        })
        .transpose()
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}
