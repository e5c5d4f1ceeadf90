//! # Checkout Service
//!
//! The checkout request handler's core: validate, build the session
//! request, call the payment strategy once, and map whatever comes back
//! into something safe to return to a client.
//!
//! ```text
//! CheckoutRequest ─► validate URLs ─► resolve idempotency key
//!                                  │
//!                                  ▼
//!                    SessionRequest::build (fixed price, mode)
//!                                  │
//!                                  ▼
//!                  PaymentStrategy::create_checkout (no retries)
//!                                  │
//!                  ┌───────────────┴───────────────┐
//!                  ▼                               ▼
//!           CheckoutSession                  CheckoutError
//! ```

use crate::config::CheckoutConfig;
use crate::error::{CheckoutError, CheckoutResult};
use crate::pricing::display_amount;
use crate::session::{CheckoutRequest, CheckoutSession, SessionRequest};
use crate::strategy::BoxedPaymentStrategy;
use crate::validate::validate_absolute_http_url;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Longest idempotency key the provider accepts
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 255;

/// Creates checkout sessions for one deployment
#[derive(Clone)]
pub struct CheckoutService {
    config: Arc<CheckoutConfig>,
    strategy: BoxedPaymentStrategy,
}

impl CheckoutService {
    pub fn new(config: Arc<CheckoutConfig>, strategy: BoxedPaymentStrategy) -> Self {
        Self { config, strategy }
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn provider_name(&self) -> &'static str {
        self.strategy.provider_name()
    }

    /// Create a checkout session.
    ///
    /// Validation failures are returned before the provider is contacted.
    #[instrument(
        skip(self, request),
        fields(provider = self.strategy.provider_name(), mode = %self.config.mode)
    )]
    pub async fn create_checkout(&self, request: CheckoutRequest) -> CheckoutResult<CheckoutSession> {
        let success_url = resolve_url(
            "successUrl",
            request.success_url.as_deref(),
            self.config.success_url.as_deref(),
        )?;
        let cancel_url = resolve_url(
            "cancelUrl",
            request.cancel_url.as_deref(),
            self.config.cancel_url.as_deref(),
        )?;
        let idempotency_key = resolve_idempotency_key(request.idempotency_key.as_deref())?;

        let session_request = SessionRequest::build(
            &self.config,
            success_url,
            cancel_url,
            request.principal.as_ref(),
            idempotency_key,
        );

        debug!(
            amount = %display_amount(session_request.total(), &self.config.currency),
            authenticated = session_request.customer_email.is_some(),
            "Creating checkout session"
        );

        let session = self
            .strategy
            .create_checkout(&session_request)
            .await
            .map_err(contain_provider_failure)?;

        if !session.is_complete() {
            error!("Provider returned a session without id or url");
            return Err(CheckoutError::Internal(
                "provider returned an incomplete session".to_string(),
            ));
        }

        info!(session_id = %session.id, "Created checkout session");
        Ok(session)
    }
}

/// Log a strategy failure and make sure only provider-described failures
/// keep their text.
fn contain_provider_failure(err: CheckoutError) -> CheckoutError {
    match err {
        CheckoutError::ProviderError { .. } => {
            warn!("Payment provider rejected checkout: {}", err);
            err
        }
        CheckoutError::Network(_) | CheckoutError::Internal(_) => {
            error!("Checkout failed: {}", err);
            err
        }
        CheckoutError::InvalidRequest(message) | CheckoutError::Configuration(message) => {
            error!("Checkout failed inside provider: {}", message);
            CheckoutError::Internal(message)
        }
    }
}

fn resolve_url(field: &str, requested: Option<&str>, fallback: Option<&str>) -> CheckoutResult<String> {
    match (requested, fallback) {
        (Some(raw), _) => validate_absolute_http_url(field, raw),
        (None, Some(default)) => Ok(default.to_string()),
        (None, None) => Err(CheckoutError::invalid_request(format!(
            "{} is required",
            field
        ))),
    }
}

/// Use the client's key when it is well-formed, otherwise mint a fresh one.
fn resolve_idempotency_key(requested: Option<&str>) -> CheckoutResult<String> {
    match requested {
        None => Ok(Uuid::new_v4().to_string()),
        Some(key) => {
            let valid = !key.is_empty()
                && key.len() <= MAX_IDEMPOTENCY_KEY_LEN
                && key.chars().all(|c| c.is_ascii_graphic());
            if valid {
                Ok(key.to_string())
            } else {
                Err(CheckoutError::invalid_request(format!(
                    "Idempotency-Key must be 1-{} visible ASCII characters",
                    MAX_IDEMPOTENCY_KEY_LEN
                )))
            }
        }
    }
}
