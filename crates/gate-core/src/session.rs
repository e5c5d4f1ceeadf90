//! # Checkout Session Types
//!
//! Inbound checkout requests, the provider-agnostic session request built
//! from them, and the `{id, url}` result handed back to clients.

use crate::config::CheckoutConfig;
use crate::pricing::CheckoutMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used for the subscription line item
pub const SUBSCRIPTION_LABEL: &str = "Unlimited conversions";

/// Metadata key carrying the pack size for fulfillment
pub const METADATA_PACK_SIZE: &str = "packSize";

/// Metadata key marking a subscription purchase
pub const METADATA_SUBSCRIPTION: &str = "subscription";

/// The authenticated caller, as established by the identity verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Identifier of the caller (an email address for the identity
    /// providers in use)
    pub name: String,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Name usable as customer contact, if it is not blank
    pub fn contact(&self) -> Option<&str> {
        let name = self.name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// A checkout request as received from a client
#[derive(Debug, Clone, Default)]
pub struct CheckoutRequest {
    /// Where the provider sends the customer after paying
    pub success_url: Option<String>,
    /// Where the provider sends the customer after cancelling
    pub cancel_url: Option<String>,
    /// Caller identity, present only when the filter chain authenticated it
    pub principal: Option<Principal>,
    /// Client-supplied idempotency key
    pub idempotency_key: Option<String>,
}

impl CheckoutRequest {
    pub fn new(success_url: impl Into<String>, cancel_url: impl Into<String>) -> Self {
        Self {
            success_url: Some(success_url.into()),
            cancel_url: Some(cancel_url.into()),
            principal: None,
            idempotency_key: None,
        }
    }

    /// Builder: set the authenticated principal
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Builder: set the idempotency key
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

/// Provider-side checkout mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// One-time payment
    Payment,
    /// Recurring subscription
    Subscription,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Payment => "payment",
            SessionMode::Subscription => "subscription",
        }
    }
}

/// Recurrence of a subscription line item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub interval: String,
    pub interval_count: u32,
}

impl Recurrence {
    pub fn monthly() -> Self {
        Self {
            interval: "month".to_string(),
            interval_count: 1,
        }
    }
}

/// The single line item of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Human-readable product label
    pub name: String,
    /// Lower-cased currency code
    pub currency: String,
    /// Unit amount in minor units
    pub unit_amount: i64,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurring: Option<Recurrence>,
}

/// Everything a payment provider needs to open a hosted checkout page
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest {
    pub mode: SessionMode,
    pub success_url: String,
    pub cancel_url: String,
    pub line_item: LineItem,
    /// Customer contact prefill, never empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    /// Purchase-type markers for downstream fulfillment
    pub metadata: BTreeMap<String, String>,
    /// Provider-side deduplication key
    pub idempotency_key: String,
}

impl SessionRequest {
    /// Build the session for this deployment's mode from validated URLs.
    pub fn build(
        config: &CheckoutConfig,
        success_url: String,
        cancel_url: String,
        principal: Option<&Principal>,
        idempotency_key: String,
    ) -> Self {
        let (mode, recurring, metadata) = match config.mode {
            CheckoutMode::Pack => (
                SessionMode::Payment,
                None,
                BTreeMap::from([(
                    METADATA_PACK_SIZE.to_string(),
                    config.pack_size.to_string(),
                )]),
            ),
            CheckoutMode::Subscription => (
                SessionMode::Subscription,
                Some(Recurrence::monthly()),
                BTreeMap::from([(
                    METADATA_SUBSCRIPTION.to_string(),
                    "monthly".to_string(),
                )]),
            ),
        };

        Self {
            mode,
            success_url,
            cancel_url,
            line_item: LineItem {
                name: product_label(config),
                currency: config.currency.as_str().to_string(),
                unit_amount: config.unit_price_minor,
                quantity: 1,
                recurring,
            },
            customer_email: principal.and_then(Principal::contact).map(str::to_string),
            metadata,
            idempotency_key,
        }
    }

    /// Amount charged for this session, in minor units
    pub fn total(&self) -> i64 {
        self.line_item.unit_amount * self.line_item.quantity as i64
    }
}

/// Line item label for a deployment
pub fn product_label(config: &CheckoutConfig) -> String {
    match config.mode {
        CheckoutMode::Pack => format!("{} extra conversions", config.pack_size),
        CheckoutMode::Subscription => SUBSCRIPTION_LABEL.to_string(),
    }
}

/// A checkout session created by a payment provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Provider's session ID
    pub id: String,
    /// URL to redirect the customer to
    pub url: String,
}

impl CheckoutSession {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Both fields must be non-empty to be usable by a client
    pub fn is_complete(&self) -> bool {
        !self.id.trim().is_empty() && !self.url.trim().is_empty()
    }
}
