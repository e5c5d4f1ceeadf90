//! # Payment Strategy Trait
//!
//! Strategy seam for payment providers. The checkout service only knows
//! this trait; Stripe (and any test double) implements it.
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │           PaymentStrategy (trait)          │
//! │  ├── create_checkout(&SessionRequest)      │
//! │  └── provider_name()                       │
//! └────────────────────────────────────────────┘
//!                        ▲
//!          ┌─────────────┴─────────────┐
//!  ┌───────┴────────┐        ┌─────────┴──────┐
//!  │ StripeCheckout │        │  test doubles  │
//!  │    Provider    │        │                │
//!  └────────────────┘        └────────────────┘
//! ```

use crate::error::CheckoutResult;
use crate::session::{CheckoutSession, SessionRequest};
use async_trait::async_trait;
use std::sync::Arc;

/// Core trait for payment provider implementations.
#[async_trait]
pub trait PaymentStrategy: Send + Sync {
    /// Open a hosted checkout session.
    ///
    /// Implementations must report failures the provider itself described as
    /// [`CheckoutError::ProviderError`](crate::CheckoutError::ProviderError)
    /// carrying only the provider's message, and everything else (transport,
    /// parsing) as `Network`/`Internal` so it never reaches the client.
    async fn create_checkout(&self, request: &SessionRequest) -> CheckoutResult<CheckoutSession>;

    /// Get the provider name (for logging).
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared payment strategy (dynamic dispatch)
pub type BoxedPaymentStrategy = Arc<dyn PaymentStrategy>;
