//! # gate-core
//!
//! Core types for the convert-gate checkout boundary.
//!
//! This crate provides:
//! - `CheckoutConfig` for the deployment's fixed billing settings
//! - `validate_absolute_http_url` for callback URL checks
//! - `SessionRequest` and `CheckoutSession` for the provider contract
//! - `PaymentStrategy` trait for implementing payment providers
//! - `CheckoutService` tying validation, construction and the provider call together
//! - `CheckoutError` / `ErrorCode` for typed, client-safe error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use gate_core::{CheckoutConfig, CheckoutRequest, CheckoutService};
//! use std::sync::Arc;
//!
//! let config = Arc::new(CheckoutConfig::from_env()?);
//! let service = CheckoutService::new(config, strategy);
//!
//! let session = service
//!     .create_checkout(CheckoutRequest::new("https://app.example.com/account", "https://app.example.com/billing"))
//!     .await?;
//!
//! // Redirect user to session.url
//! ```

pub mod config;
pub mod error;
pub mod pricing;
pub mod service;
pub mod session;
pub mod strategy;
pub mod validate;

// Re-exports for convenience
pub use config::{CheckoutConfig, CheckoutConfigBuilder};
pub use error::{CheckoutError, CheckoutResult, ErrorCode, SERVER_ERROR_MESSAGE};
pub use pricing::{CheckoutMode, CurrencyCode};
pub use service::CheckoutService;
pub use session::{
    product_label, CheckoutRequest, CheckoutSession, LineItem, Principal, Recurrence,
    SessionMode, SessionRequest,
};
pub use strategy::{BoxedPaymentStrategy, PaymentStrategy};
pub use validate::validate_absolute_http_url;
