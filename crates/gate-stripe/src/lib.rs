//! # gate-stripe
//!
//! Stripe Checkout Sessions provider for convert-gate.
//!
//! `StripeCheckoutProvider` implements `gate_core::PaymentStrategy` on top of
//! Stripe's hosted checkout page:
//! - one form-encoded `POST /v1/checkout/sessions` per checkout
//! - `Idempotency-Key` forwarded from the session request
//! - bounded request timeout
//! - Stripe's own error message surfaced as a provider error, nothing else
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gate_core::{CheckoutConfig, CheckoutService};
//! use gate_stripe::{StripeCheckoutProvider, StripeConfig};
//! use std::sync::Arc;
//!
//! let checkout = Arc::new(CheckoutConfig::from_env()?);
//! let provider = StripeCheckoutProvider::new(StripeConfig::from_env(&checkout)?)?;
//! let service = CheckoutService::new(checkout, Arc::new(provider));
//! ```

pub mod checkout;
pub mod config;

// Re-exports
pub use checkout::StripeCheckoutProvider;
pub use config::StripeConfig;
