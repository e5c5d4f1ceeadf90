//! # Checkout Configuration
//!
//! Process-wide billing configuration, built once at startup and shared
//! read-only afterwards. Construction fails when the service would
//! otherwise start in an invalid billing state.

use crate::error::{CheckoutError, CheckoutResult};
use crate::pricing::{parse_price_minor_units, CheckoutMode, CurrencyCode};
use crate::validate::validate_absolute_http_url;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

/// Default price per pack, in major currency units
pub const DEFAULT_UNIT_PRICE: &str = "1.0";

/// Default number of conversions in a pack
pub const DEFAULT_PACK_SIZE: i64 = 5;

/// Default provider call timeout
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Billing configuration
#[derive(Debug)]
pub struct CheckoutConfig {
    /// Payment provider secret credential
    pub secret_key: SecretString,

    /// Unit price in minor units, always > 0
    pub unit_price_minor: i64,

    /// Conversions per pack, always >= 1
    pub pack_size: u32,

    /// Lower-cased currency code
    pub currency: CurrencyCode,

    /// One-time pack or monthly subscription
    pub mode: CheckoutMode,

    /// Success URL used when a request omits one
    pub success_url: Option<String>,

    /// Cancel URL used when a request omits one
    pub cancel_url: Option<String>,

    /// Upper bound on a single provider call
    pub provider_timeout: Duration,
}

impl CheckoutConfig {
    /// Start building a configuration around a secret key
    pub fn builder(secret_key: impl Into<String>) -> CheckoutConfigBuilder {
        CheckoutConfigBuilder::new(secret_key)
    }

    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `STRIPE_SECRET_KEY`
    ///
    /// Optional: `CHECKOUT_MODE`, `CHECKOUT_UNIT_PRICE`, `CHECKOUT_PACK_SIZE`,
    /// `CHECKOUT_CURRENCY`, `CHECKOUT_SUCCESS_URL`, `CHECKOUT_CANCEL_URL`,
    /// `PROVIDER_TIMEOUT_SECS`.
    pub fn from_env() -> CheckoutResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> CheckoutResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret_key = lookup("STRIPE_SECRET_KEY").ok_or_else(|| {
            CheckoutError::Configuration("STRIPE_SECRET_KEY not set".to_string())
        })?;

        let mut builder = Self::builder(secret_key);

        if let Some(mode) = lookup("CHECKOUT_MODE") {
            builder = builder.mode(mode.parse()?);
        }
        if let Some(price) = lookup("CHECKOUT_UNIT_PRICE") {
            builder = builder.unit_price(price);
        }
        if let Some(size) = lookup("CHECKOUT_PACK_SIZE") {
            let size = size.trim().parse::<i64>().map_err(|_| {
                CheckoutError::Configuration(format!(
                    "CHECKOUT_PACK_SIZE must be an integer, got {:?}",
                    size
                ))
            })?;
            builder = builder.pack_size(size);
        }
        if let Some(currency) = lookup("CHECKOUT_CURRENCY") {
            builder = builder.currency(currency);
        }
        if let Some(url) = lookup("CHECKOUT_SUCCESS_URL").filter(|u| !u.trim().is_empty()) {
            builder = builder.success_url(url);
        }
        if let Some(url) = lookup("CHECKOUT_CANCEL_URL").filter(|u| !u.trim().is_empty()) {
            builder = builder.cancel_url(url);
        }
        if let Some(secs) = lookup("PROVIDER_TIMEOUT_SECS") {
            let secs = secs.trim().parse::<u64>().map_err(|_| {
                CheckoutError::Configuration(format!(
                    "PROVIDER_TIMEOUT_SECS must be a positive integer, got {:?}",
                    secs
                ))
            })?;
            builder = builder.provider_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }
}

/// Builder for [`CheckoutConfig`]; `build()` enforces every invariant
#[derive(Debug, Clone)]
pub struct CheckoutConfigBuilder {
    secret_key: String,
    unit_price: String,
    pack_size: i64,
    currency: String,
    mode: CheckoutMode,
    success_url: Option<String>,
    cancel_url: Option<String>,
    provider_timeout: Duration,
}

impl CheckoutConfigBuilder {
    fn new(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            unit_price: DEFAULT_UNIT_PRICE.to_string(),
            pack_size: DEFAULT_PACK_SIZE,
            currency: "usd".to_string(),
            mode: CheckoutMode::Pack,
            success_url: None,
            cancel_url: None,
            provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
        }
    }

    /// Decimal price in major units (e.g. "1.98")
    pub fn unit_price(mut self, price: impl Into<String>) -> Self {
        self.unit_price = price.into();
        self
    }

    pub fn pack_size(mut self, size: i64) -> Self {
        self.pack_size = size;
        self
    }

    pub fn currency(mut self, code: impl Into<String>) -> Self {
        self.currency = code.into();
        self
    }

    pub fn mode(mut self, mode: CheckoutMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn success_url(mut self, url: impl Into<String>) -> Self {
        self.success_url = Some(url.into());
        self
    }

    pub fn cancel_url(mut self, url: impl Into<String>) -> Self {
        self.cancel_url = Some(url.into());
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Validate and freeze the configuration
    pub fn build(self) -> CheckoutResult<CheckoutConfig> {
        if self.secret_key.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "STRIPE_SECRET_KEY must not be blank".to_string(),
            ));
        }

        let unit_price_minor = parse_price_minor_units(&self.unit_price)?;
        if unit_price_minor <= 0 {
            return Err(CheckoutError::Configuration(format!(
                "unit price must be positive, got {:?}",
                self.unit_price
            )));
        }

        if self.pack_size < 1 {
            return Err(CheckoutError::Configuration(format!(
                "pack size must be at least 1, got {}",
                self.pack_size
            )));
        }
        let pack_size = u32::try_from(self.pack_size).map_err(|_| {
            CheckoutError::Configuration(format!("pack size {} is too large", self.pack_size))
        })?;

        let currency = CurrencyCode::parse(&self.currency)?;

        if self.provider_timeout.is_zero() {
            return Err(CheckoutError::Configuration(
                "provider timeout must be greater than zero".to_string(),
            ));
        }

        let success_url = self
            .success_url
            .map(|url| default_url("CHECKOUT_SUCCESS_URL", &url))
            .transpose()?;
        let cancel_url = self
            .cancel_url
            .map(|url| default_url("CHECKOUT_CANCEL_URL", &url))
            .transpose()?;

        Ok(CheckoutConfig {
            secret_key: SecretString::new(self.secret_key.trim().to_string()),
            unit_price_minor,
            pack_size,
            currency,
            mode: self.mode,
            success_url,
            cancel_url,
            provider_timeout: self.provider_timeout,
        })
    }
}

fn default_url(name: &str, raw: &str) -> CheckoutResult<String> {
    validate_absolute_http_url(name, raw)
        .map_err(|e| CheckoutError::Configuration(e.client_message()))
}
