//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use checkout::{GatewaySettings, SecretKey};
use thiserror::Error;

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither `GATEWAY_SECRET_KEY_FILE` nor `GATEWAY_SECRET_KEY` is set.
    #[error("gateway secret is not configured; set GATEWAY_SECRET_KEY_FILE or GATEWAY_SECRET_KEY")]
    MissingSecret,

    /// The mounted secret file could not be read.
    #[error("cannot read gateway secret from {path}: {source}")]
    SecretFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A variable is set to a value that cannot be parsed.
    #[error("invalid value for {name}: '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `info`)
/// - `LOG_FORMAT`: `text` or `json`
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory store
/// - `GATEWAY_SECRET_KEY_FILE` or `GATEWAY_SECRET_KEY`: shared gateway secret
/// - `GATEWAY_PRODUCT_CODE`, `GATEWAY_FORM_URL`, `GATEWAY_STATUS_URL`,
///   `GATEWAY_TIMEOUT_MS`: gateway endpoints
/// - `PUBLIC_BASE_URL`: base for the callback URLs handed to the gateway
/// - `RESERVATION_TTL_SECS`, `RESERVATION_SWEEP_SECS`: cart reservation expiry
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub gateway_secret: SecretKey,
    pub product_code: String,
    pub form_url: String,
    pub status_url: String,
    pub gateway_timeout: Duration,
    pub public_base_url: String,
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT",
                    value: other.to_string(),
                });
            }
        };

        Ok(Self {
            host: or("HOST", "0.0.0.0"),
            port: parse(&var, "PORT", 3000)?,
            log_level: or("RUST_LOG", "info"),
            log_format,
            database_url: var("DATABASE_URL"),
            gateway_secret: load_secret(&var)?,
            product_code: or("GATEWAY_PRODUCT_CODE", "EPAYTEST"),
            form_url: or(
                "GATEWAY_FORM_URL",
                "https://rc-epay.esewa.com.np/api/epay/main/v2/form",
            ),
            status_url: or("GATEWAY_STATUS_URL", "https://rc.esewa.com.np"),
            gateway_timeout: Duration::from_millis(parse(&var, "GATEWAY_TIMEOUT_MS", 5000)?),
            public_base_url: or("PUBLIC_BASE_URL", "http://localhost:3000"),
            reservation_ttl: Duration::from_secs(parse(&var, "RESERVATION_TTL_SECS", 3600)?),
            sweep_interval: Duration::from_secs(parse(&var, "RESERVATION_SWEEP_SECS", 60)?),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Merchant settings handed to the checkout orchestrator.
    pub fn gateway_settings(&self) -> GatewaySettings {
        let base = self.public_base_url.trim_end_matches('/');
        GatewaySettings {
            product_code: self.product_code.clone(),
            form_url: self.form_url.clone(),
            success_url: format!("{base}/payment/success"),
            failure_url: format!("{base}/payment/failure"),
        }
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// The mounted file wins over the plain variable.
fn load_secret(var: &impl Fn(&str) -> Option<String>) -> Result<SecretKey, ConfigError> {
    if let Some(path) = var("GATEWAY_SECRET_KEY_FILE") {
        let path = PathBuf::from(path);
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::SecretFile { path, source })?;
        let secret = contents.trim_end_matches(['\r', '\n']);
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        return Ok(SecretKey::new(secret));
    }

    var("GATEWAY_SECRET_KEY")
        .map(SecretKey::new)
        .ok_or(ConfigError::MissingSecret)
}
