//! # Stripe Configuration
//!
//! Connection settings for the Stripe API. The secret key comes from the
//! already-validated [`CheckoutConfig`]; only transport details are read
//! here.

use gate_core::{CheckoutConfig, CheckoutError, CheckoutResult};
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;

/// Production API endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Pinned API version
pub const DEFAULT_API_VERSION: &str = "2024-12-18.acacia";

/// Stripe API configuration
#[derive(Debug)]
pub struct StripeConfig {
    /// Secret API key (sk_test_... / sk_live_... or restricted rk_...)
    pub secret_key: SecretString,

    /// API base URL (for testing/mocking)
    pub api_base_url: String,

    /// API version
    pub api_version: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl StripeConfig {
    /// Create config with explicit values (for testing)
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: SecretString::new(secret_key.into()),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: Duration::from_secs(gate_core::config::DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Derive Stripe settings from the billing configuration
    pub fn from_checkout_config(config: &CheckoutConfig) -> CheckoutResult<Self> {
        let key = config.secret_key.expose_secret();

        if !["sk_test_", "sk_live_", "rk_test_", "rk_live_"]
            .iter()
            .any(|prefix| key.starts_with(prefix))
        {
            return Err(CheckoutError::Configuration(
                "STRIPE_SECRET_KEY must start with sk_test_, sk_live_, rk_test_ or rk_live_"
                    .to_string(),
            ));
        }

        Ok(Self::new(key.clone()).with_timeout(config.provider_timeout))
    }

    /// Load from the billing configuration plus environment overrides.
    ///
    /// Optional env vars:
    /// - `STRIPE_API_BASE_URL`
    pub fn from_env(config: &CheckoutConfig) -> CheckoutResult<Self> {
        let mut stripe = Self::from_checkout_config(config)?;
        if let Ok(base_url) = env::var("STRIPE_API_BASE_URL") {
            if !base_url.trim().is_empty() {
                stripe = stripe.with_api_base_url(base_url.trim());
            }
        }
        Ok(stripe)
    }

    /// Check if using test keys
    pub fn is_test_mode(&self) -> bool {
        self.secret_key.expose_secret().contains("_test_")
    }

    /// Check if using live keys
    pub fn is_live_mode(&self) -> bool {
        self.secret_key.expose_secret().contains("_live_")
    }

    /// Get authorization header value
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.secret_key.expose_secret())
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
