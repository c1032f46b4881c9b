//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::usage::PriceTable;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
        }
    }
}

/// Upstream functions (schema fetch, SQL generation)
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub functions_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            functions_url: "http://localhost:54321/functions/v1".to_string(),
            api_key: None,
            timeout_secs: 40,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Odometer persistence; in-memory when `path` is unset
#[derive(Debug, Clone, Default)]
pub struct OdometerConfig {
    pub path: Option<PathBuf>,
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub pricing: PriceTable,
    pub cors: CorsConfig,
    pub odometer: OdometerConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let server = ServerConfig {
            host: parse_or(var("HOST"), "HOST", ServerConfig::default().host)?,
            port: parse_or(var("PORT"), "PORT", ServerConfig::default().port)?,
        };

        let upstream = UpstreamConfig {
            functions_url: var("UPSTREAM_FUNCTIONS_URL")
                .unwrap_or_else(|| UpstreamConfig::default().functions_url),
            api_key: var("UPSTREAM_API_KEY"),
            timeout_secs: parse_or(
                var("UPSTREAM_TIMEOUT_SECS"),
                "UPSTREAM_TIMEOUT_SECS",
                UpstreamConfig::default().timeout_secs,
            )?,
        };

        url::Url::parse(&upstream.functions_url).map_err(|e| {
            ConfigError::InvalidValue(format!(
                "UPSTREAM_FUNCTIONS_URL '{}' is not a URL: {}",
                upstream.functions_url, e
            ))
        })?;

        if upstream.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "UPSTREAM_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }

        let pricing = PriceTable::new(
            parse_price(var("PRICE_INPUT_PER_1K"), "PRICE_INPUT_PER_1K")?,
            parse_price(var("PRICE_OUTPUT_PER_1K"), "PRICE_OUTPUT_PER_1K")?,
        );

        let cors = CorsConfig {
            allowed_origins: var("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let odometer = OdometerConfig {
            path: var("ODOMETER_PATH").map(PathBuf::from),
        };

        Ok(Self {
            server,
            upstream,
            pricing,
            cors,
            odometer,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{} has an invalid value '{}'", key, raw))),
    }
}

fn parse_price(value: Option<String>, key: &str) -> Result<f64, ConfigError> {
    let price: f64 = parse_or(value, key, 0.0)?;
    if !price.is_finite() || price < 0.0 {
        return Err(ConfigError::InvalidValue(format!(
            "{} must be a non-negative number",
            key
        )));
    }
    Ok(price)
}
