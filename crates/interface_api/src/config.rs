//! API configuration

use std::str::FromStr;

use serde::Deserialize;

use core_kernel::{Currency, MoneyError};

/// API configuration, read from `API_*` environment variables
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    pub db_max_connections: u32,
    /// Log level
    pub log_level: String,
    /// Empty disables the card gateway; card payments then settle manually
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub stripe_api_base: Option<String>,
    /// ISO code applied to payments created without a currency
    pub default_currency: String,
    /// Seconds between recurring runs; 0 disables the scheduler
    pub recurring_interval_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/rentora".to_string(),
            db_max_connections: 10,
            log_level: "info".to_string(),
            stripe_secret_key: String::new(),
            stripe_webhook_secret: String::new(),
            stripe_api_base: None,
            default_currency: "GBP".to_string(),
            recurring_interval_secs: 3600,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    ///
    /// Unset keys keep their defaults.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn default_currency(&self) -> Result<Currency, MoneyError> {
        Currency::from_str(&self.default_currency)
    }

    pub fn stripe_enabled(&self) -> bool {
        !self.stripe_secret_key.trim().is_empty()
    }
}
