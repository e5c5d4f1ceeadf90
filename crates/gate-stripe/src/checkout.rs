//! # Stripe Checkout Sessions
//!
//! Implementation of the Stripe Checkout Sessions API as a
//! [`PaymentStrategy`]. Sessions are created with a single form-encoded
//! POST; Stripe hosts the payment page.

use crate::config::StripeConfig;
use async_trait::async_trait;
use gate_core::{
    CheckoutError, CheckoutResult, CheckoutSession, PaymentStrategy, SessionMode, SessionRequest,
};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "stripe";

/// Stripe Checkout Session provider
///
/// Uses Stripe's hosted checkout page; card data never touches this service.
pub struct StripeCheckoutProvider {
    config: StripeConfig,
    client: Client,
}

impl StripeCheckoutProvider {
    /// Create a new Stripe checkout provider
    pub fn new(config: StripeConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Build the form body for `POST /v1/checkout/sessions`
    fn form_params(request: &SessionRequest) -> Vec<(String, String)> {
        let item = &request.line_item;

        let mut form_params: Vec<(String, String)> = vec![
            ("mode".to_string(), request.mode.as_str().to_string()),
            ("success_url".to_string(), request.success_url.clone()),
            ("cancel_url".to_string(), request.cancel_url.clone()),
            (
                "line_items[0][price_data][currency]".to_string(),
                item.currency.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                item.unit_amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                item.name.clone(),
            ),
        ];

        if let Some(ref recurring) = item.recurring {
            form_params.push((
                "line_items[0][price_data][recurring][interval]".to_string(),
                recurring.interval.clone(),
            ));
            form_params.push((
                "line_items[0][price_data][recurring][interval_count]".to_string(),
                recurring.interval_count.to_string(),
            ));
        }

        form_params.push((
            "line_items[0][quantity]".to_string(),
            item.quantity.to_string(),
        ));

        if let Some(ref email) = request.customer_email {
            form_params.push(("customer_email".to_string(), email.clone()));
        }

        for (key, value) in &request.metadata {
            form_params.push((format!("metadata[{}]", key), value.clone()));
        }

        // Subscriptions outlive the session; copy the markers onto them too
        if request.mode == SessionMode::Subscription {
            for (key, value) in &request.metadata {
                form_params.push((
                    format!("subscription_data[metadata][{}]", key),
                    value.clone(),
                ));
            }
        }

        form_params
    }
}

#[async_trait]
impl PaymentStrategy for StripeCheckoutProvider {
    #[instrument(skip(self, request), fields(mode = request.mode.as_str()))]
    async fn create_checkout(&self, request: &SessionRequest) -> CheckoutResult<CheckoutSession> {
        let form_params = Self::form_params(request);

        debug!(
            "Creating Stripe checkout session: amount={} {}, params={}",
            request.line_item.unit_amount,
            request.line_item.currency,
            form_params.len()
        );

        let url = format!("{}/v1/checkout/sessions", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.config.auth_header())
            .header("Stripe-Version", &self.config.api_version)
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&form_params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CheckoutError::Network(format!(
                        "Stripe did not answer within {:?}",
                        self.config.timeout
                    ))
                } else {
                    CheckoutError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CheckoutError::Network(e.to_string()))?;

        if !status.is_success() {
            error!("Stripe API error: status={}, body={}", status, body);

            let message = serde_json::from_str::<StripeErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| format!("Payment provider returned HTTP {}", status.as_u16()));

            return Err(CheckoutError::provider(PROVIDER, message));
        }

        let session_response: StripeCheckoutSessionResponse = serde_json::from_str(&body)
            .map_err(|e| {
                CheckoutError::Internal(format!("Failed to parse Stripe response: {}", e))
            })?;

        info!(
            "Created Stripe checkout session: id={}, livemode={}",
            session_response.id, session_response.livemode
        );

        Ok(CheckoutSession::new(
            session_response.id,
            session_response.url.unwrap_or_default(),
        ))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Stripe API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct StripeCheckoutSessionResponse {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    livemode: bool,
}

#[derive(Debug, Deserialize)]
struct StripeErrorResponse {
    error: StripeError,
}

#[derive(Debug, Deserialize)]
struct StripeError {
    #[serde(default)]
    message: Option<String>,
}
