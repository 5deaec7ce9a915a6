//! Stripe client settings

use std::time::Duration;

/// Public Stripe REST endpoint
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Maximum webhook timestamp age Stripe recommends
pub const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Credentials and endpoints for the Stripe adapter
///
/// ```rust
/// use infra_gateway::StripeConfig;
///
/// let config = StripeConfig::new("sk_test_123", "whsec_abc")
///     .api_base("http://localhost:12111");
/// assert_eq!(config.api_base, "http://localhost:12111");
/// ```
#[derive(Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    /// Base URL without a trailing slash
    pub api_base: String,
    pub timeout: Duration,
    pub webhook_tolerance_secs: i64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout: Duration::from_secs(30),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn webhook_tolerance_secs(mut self, secs: i64) -> Self {
        self.webhook_tolerance_secs = secs;
        self
    }

    /// True when a secret key is present
    pub fn is_configured(&self) -> bool {
        !self.secret_key.trim().is_empty()
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[redacted]")
            .field("webhook_secret", &"[redacted]")
            .field("api_base", &self.api_base)
            .field("timeout", &self.timeout)
            .field("webhook_tolerance_secs", &self.webhook_tolerance_secs)
            .finish()
    }
}
