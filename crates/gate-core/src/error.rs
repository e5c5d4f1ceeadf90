//! # Checkout Error Types
//!
//! Typed error handling for the checkout boundary.
//! All checkout operations return `Result<T, CheckoutError>`.
//!
//! Errors carry two faces: the `Display` text (for server-side logs) and the
//! client-facing `{code, message}` pair from [`CheckoutError::code`] and
//! [`CheckoutError::client_message`]. Only invalid requests and
//! provider-reported failures expose their text to clients.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fixed client message for every failure that is not the client's or the
/// provider's to explain.
pub const SERVER_ERROR_MESSAGE: &str = "Unexpected error creating checkout session.";

/// Stable, machine-readable error codes returned to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed client input
    InvalidRequest,
    /// The payment provider rejected or failed the call
    PaymentProviderError,
    /// Anything unanticipated
    ServerError,
    /// Rejected by the request filter chain before reaching a handler
    AuthorizationDenied,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::PaymentProviderError => "payment_provider_error",
            ErrorCode::ServerError => "server_error",
            ErrorCode::AuthorizationDenied => "authorization_denied",
        }
    }

    /// HTTP status code for this error class
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::PaymentProviderError => 502,
            ErrorCode::ServerError => 500,
            ErrorCode::AuthorizationDenied => 403,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type for checkout operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Startup configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Payment provider reported a failure
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with provider
    #[error("Network error: {0}")]
    Network(String),

    /// Internal error (unparseable provider response, broken invariant)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CheckoutError {
    pub fn invalid_request(message: impl Into<String>) -> Self {
        CheckoutError::InvalidRequest(message.into())
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        CheckoutError::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Wire code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            CheckoutError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            CheckoutError::ProviderError { .. } => ErrorCode::PaymentProviderError,
            CheckoutError::Configuration(_)
            | CheckoutError::Network(_)
            | CheckoutError::Internal(_) => ErrorCode::ServerError,
        }
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }

    /// Message safe to show to a client.
    ///
    /// Provider errors carry the provider's own text only; server-side
    /// failures collapse to [`SERVER_ERROR_MESSAGE`].
    pub fn client_message(&self) -> String {
        match self {
            CheckoutError::InvalidRequest(message) => message.clone(),
            CheckoutError::ProviderError { message, .. } => message.clone(),
            _ => SERVER_ERROR_MESSAGE.to_string(),
        }
    }

    /// Returns true if a caller may sensibly retry the same request later.
    /// Nothing in this crate retries automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::ProviderError { .. } | CheckoutError::Network(_)
        )
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_status() {
        let err = CheckoutError::invalid_request("successUrl is required");
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.status_code(), 400);

        let err = CheckoutError::provider("stripe", "Your card was declined.");
        assert_eq!(err.code(), ErrorCode::PaymentProviderError);
        assert_eq!(err.status_code(), 502);

        assert_eq!(CheckoutError::Network("timeout".into()).status_code(), 500);
        assert_eq!(ErrorCode::AuthorizationDenied.status_code(), 403);
    }

    #[test]
    fn test_client_message_hides_internals() {
        let err = CheckoutError::Internal("missing field `url` at line 1".into());
        assert_eq!(err.client_message(), SERVER_ERROR_MESSAGE);

        let err = CheckoutError::Network("error sending request for url (https://api.stripe.com)".into());
        assert_eq!(err.client_message(), SERVER_ERROR_MESSAGE);

        let err = CheckoutError::provider("stripe", "Invalid API Key provided: sk_test_****");
        assert_eq!(err.client_message(), "Invalid API Key provided: sk_test_****");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(CheckoutError::Network("timeout".into()).is_retryable());
        assert!(CheckoutError::provider("stripe", "rate limited").is_retryable());
        assert!(!CheckoutError::invalid_request("bad data").is_retryable());
    }

    #[test]
    fn test_code_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCode::PaymentProviderError).unwrap();
        assert_eq!(json, "\"payment_provider_error\"");
        assert_eq!(ErrorCode::AuthorizationDenied.to_string(), "authorization_denied");
    }
}
