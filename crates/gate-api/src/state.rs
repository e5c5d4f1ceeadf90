//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the checkout service, the security policy, and the filter chain
//! built from it. Everything is immutable after startup.

use crate::security::{
    CsrfTokens, FilterChain, IdentityVerifier, NoIdentity, PolicyError, SecurityPolicy,
    StaticTokenVerifier,
};
use anyhow::Context;
use gate_core::{CheckoutConfig, CheckoutService};
use gate_stripe::{StripeCheckoutProvider, StripeConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Emit JSON log lines instead of text
    pub json_logs: bool,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key: &str| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: lookup("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(8080),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".to_string()),
            json_logs: lookup("LOG_FORMAT")
                .map(|f| f.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Application config
    pub config: AppConfig,
    /// Checkout pipeline bound to the payment provider
    pub checkout: CheckoutService,
    /// Request policy
    pub policy: Arc<SecurityPolicy>,
    /// Anti-forgery token issuer
    pub csrf: Arc<CsrfTokens>,
    /// Ordered request filters
    pub chain: Arc<FilterChain>,
}

impl AppState {
    /// Build the production state from the environment
    ///
    /// Fails on any invalid setting so the listener is never bound with a
    /// broken configuration.
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let checkout_config =
            Arc::new(CheckoutConfig::from_env().context("Invalid checkout configuration")?);

        let stripe_config =
            StripeConfig::from_env(&checkout_config).context("Invalid Stripe configuration")?;
        if stripe_config.is_live_mode() && !config.is_production() {
            warn!("Live Stripe key in use outside production");
        }
        let provider = StripeCheckoutProvider::new(stripe_config)
            .context("Failed to initialize Stripe")?;

        let checkout = CheckoutService::new(checkout_config, Arc::new(provider));

        let policy = SecurityPolicy::from_env().context("Invalid security policy")?;

        let verifier: Arc<dyn IdentityVerifier> =
            match StaticTokenVerifier::from_env().context("Invalid IDENTITY_STATIC_TOKENS")? {
                Some(verifier) => {
                    info!("Static identity tokens loaded: {}", verifier.len());
                    Arc::new(verifier)
                }
                None => {
                    warn!("No identity verifier configured; protected routes will refuse every request");
                    Arc::new(NoIdentity)
                }
            };

        Ok(Self::from_parts(config, checkout, policy, verifier)?)
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: AppConfig,
        checkout: CheckoutService,
        policy: SecurityPolicy,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, PolicyError> {
        let policy = Arc::new(policy);
        let csrf = Arc::new(CsrfTokens::new(&policy.csrf)?);
        let chain = Arc::new(FilterChain::standard(policy.clone(), csrf.clone(), verifier)?);

        Ok(Self {
            config,
            checkout,
            policy,
            csrf,
            chain,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gate_core::{CheckoutResult, CheckoutSession, PaymentStrategy, SessionRequest};

    struct UnusedStrategy;

    #[async_trait]
    impl PaymentStrategy for UnusedStrategy {
        async fn create_checkout(&self, _request: &SessionRequest) -> CheckoutResult<CheckoutSession> {
            unreachable!("state assembly never calls the provider")
        }

        fn provider_name(&self) -> &'static str {
            "unused"
        }
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::from_lookup(|_: &str| None);
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.environment, "development");
        assert!(!config.json_logs);
        assert!(!config.is_production());
    }

    #[test]
    fn test_app_config_overrides() {
        let config = AppConfig::from_lookup(|key: &str| match key {
            "PORT" => Some("9000".to_string()),
            "ENVIRONMENT" => Some("production".to_string()),
            "LOG_FORMAT" => Some("JSON".to_string()),
            _ => None,
        });
        assert_eq!(config.port, 9000);
        assert!(config.is_production());
        assert!(config.json_logs);
    }

    #[test]
    fn test_state_keeps_the_given_config() {
        let config = AppConfig::from_lookup(|key: &str| match key {
            "PORT" => Some("9100".to_string()),
            "LOG_FORMAT" => Some("json".to_string()),
            _ => None,
        });
        let checkout_config = CheckoutConfig::builder("sk_test_state").build().unwrap();
        let checkout = CheckoutService::new(Arc::new(checkout_config), Arc::new(UnusedStrategy));
        let policy = SecurityPolicy::from_lookup(|_: &str| None).unwrap();

        let state = AppState::from_parts(config, checkout, policy, Arc::new(NoIdentity)).unwrap();

        assert_eq!(state.config.port, 9100);
        assert!(state.config.json_logs);
        assert_eq!(
            state.chain.stage_names(),
            vec!["security-headers", "csrf", "cors", "authentication", "authorization"]
        );
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "test".to_string(),
            json_logs: false,
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");

        let bad = AppConfig {
            host: "not a host".to_string(),
            ..config
        };
        assert!(bad.socket_addr().is_err());
    }
}
