//! Service configuration.
//!
//! Built once at startup from the environment and handed to the provider
//! client, the reconciler and the router. Nothing below `main` reads the
//! process environment.

use crate::error::{AppError, AppResult};
use log::{info, warn};
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:meetline.db?mode=rwc";
pub const DEFAULT_AUTH_HEADER: &str = "x-auth-user-id";
pub const DEFAULT_STREAM_BASE_URL: &str = "https://video.stream-io-api.com";
pub const DEFAULT_CALL_TYPE: &str = "default";
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 5_000;

/// Credentials and endpoint of the Stream Video REST API.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub api_key: String,
    pub api_secret: String,
    pub base_url: String,
    pub call_type: String,
}

impl StreamConfig {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            base_url: DEFAULT_STREAM_BASE_URL.to_string(),
            call_type: DEFAULT_CALL_TYPE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    /// Header carrying the identity-provider user id, set by the gateway.
    pub auth_header: String,
    /// `None` runs without a call provider: time-based inference only.
    pub stream: Option<StreamConfig>,
    pub provider_timeout: Duration,
    /// Honored only in debug builds.
    pub enable_test_auth: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            auth_header: DEFAULT_AUTH_HEADER.to_string(),
            stream: None,
            provider_timeout: Duration::from_millis(DEFAULT_PROVIDER_TIMEOUT_MS),
            enable_test_auth: false,
        }
    }
}

impl Config {
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key/value source; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Config::default();

        let stream = match (get("STREAM_API_KEY"), get("STREAM_API_SECRET")) {
            (Some(key), Some(secret)) => {
                let mut stream = StreamConfig::new(&key, &secret);
                if let Some(base_url) = get("STREAM_BASE_URL") {
                    stream = stream.with_base_url(&base_url);
                }
                if let Some(call_type) = get("STREAM_CALL_TYPE") {
                    stream.call_type = call_type;
                }
                Some(stream)
            }
            (None, None) => None,
            _ => {
                return Err(AppError::config(
                    "STREAM_API_KEY and STREAM_API_SECRET must be set together",
                ))
            }
        };

        let provider_timeout = match get("MEETLINE_PROVIDER_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|_| {
                    AppError::config(format!("MEETLINE_PROVIDER_TIMEOUT_MS is not a number: {}", raw))
                })?;
                Duration::from_millis(ms)
            }
            None => defaults.provider_timeout,
        };

        let enable_test_auth = get("MEETLINE_ENABLE_TEST_AUTH")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            bind_addr: get("MEETLINE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: get("MEETLINE_DATABASE_URL").unwrap_or(defaults.database_url),
            auth_header: get("MEETLINE_AUTH_HEADER")
                .map(|h| h.to_lowercase())
                .unwrap_or(defaults.auth_header),
            stream,
            provider_timeout,
            enable_test_auth,
        })
    }
}

/// Validates the configuration before anything is started.
pub fn validate_config(config: &Config) -> AppResult<()> {
    config
        .bind_addr
        .parse::<SocketAddr>()
        .map_err(|e| AppError::config(format!("Invalid bind address '{}': {}", config.bind_addr, e)))?;

    if !config.database_url.starts_with("sqlite:") {
        return Err(AppError::config(format!(
            "Only sqlite: database URLs are supported, got '{}'",
            config.database_url
        )));
    }

    if axum::http::HeaderName::from_bytes(config.auth_header.as_bytes()).is_err() {
        return Err(AppError::config(format!(
            "Invalid auth header name '{}'",
            config.auth_header
        )));
    }

    if config.provider_timeout.is_zero() {
        return Err(AppError::config("Provider timeout must be greater than zero"));
    }

    match &config.stream {
        Some(stream) => {
            validate_base_url(&stream.base_url)?;
            info!("Call provider configured ({}, call type '{}')", stream.base_url, stream.call_type);
        }
        None => warn!("No call provider configured; meeting status will be inferred from schedule only"),
    }

    if config.enable_test_auth {
        if cfg!(debug_assertions) {
            warn!("Test authentication is enabled; never run this build in production");
        } else {
            warn!("MEETLINE_ENABLE_TEST_AUTH is ignored in release builds");
        }
    }

    Ok(())
}

fn validate_base_url(base_url: &str) -> AppResult<()> {
    let parsed = Url::parse(base_url)
        .map_err(|e| AppError::config(format!("Invalid STREAM_BASE_URL '{}': {}", base_url, e)))?;

    match parsed.scheme() {
        "https" => {}
        "http" => warn!("STREAM_BASE_URL uses plain HTTP: {}", base_url),
        other => {
            return Err(AppError::config(format!(
                "STREAM_BASE_URL must be http(s), got '{}://'",
                other
            )))
        }
    }

    if parsed.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(AppError::config("STREAM_BASE_URL must have a host"));
    }

    Ok(())
}
