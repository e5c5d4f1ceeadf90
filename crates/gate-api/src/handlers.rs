//! # Request Handlers
//!
//! Axum request handlers for the billing API.
//! By the time a handler runs, the filter chain has already applied the
//! CSRF, CORS and identity rules.

use crate::error::ApiError;
use crate::security::{AuthenticatedPrincipal, CSRF_HEADER};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use gate_core::pricing::display_amount;
use gate_core::{product_label, CheckoutMode, CheckoutRequest, CheckoutSession};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Callback URLs accepted from the query string or a form body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutParams {
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

impl CheckoutParams {
    fn from_urlencoded(raw: &[u8]) -> Result<Self, ApiError> {
        if raw.is_empty() {
            return Ok(Self::default());
        }
        serde_urlencoded::from_bytes(raw)
            .map_err(|_| ApiError::invalid_request("Malformed checkout parameters"))
    }

    /// Fields set here win over `fallback`
    fn or(self, fallback: Self) -> Self {
        Self {
            success_url: self.success_url.or(fallback.success_url),
            cancel_url: self.cancel_url.or(fallback.cancel_url),
        }
    }
}

/// CSRF token issue response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub token: String,
    pub header_name: &'static str,
}

/// Display pricing for the configured product
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingResponse {
    pub mode: CheckoutMode,
    pub unit_amount: i64,
    pub currency: String,
    pub pack_size: u32,
    pub label: String,
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<&'static str>,
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "convert-gate",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Issue an anti-forgery token as JSON and as the `XSRF-TOKEN` cookie
pub async fn csrf_token(State(state): State<AppState>) -> impl IntoResponse {
    let token = state.csrf.issue();
    let cookie = state.csrf.cookie(&token).to_string();

    (
        [
            (header::SET_COOKIE, cookie),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        Json(CsrfTokenResponse {
            token,
            header_name: CSRF_HEADER,
        }),
    )
}

/// Current product and price
pub async fn pricing(State(state): State<AppState>) -> Json<PricingResponse> {
    let config = state.checkout.config();

    Json(PricingResponse {
        mode: config.mode,
        unit_amount: config.unit_price_minor,
        currency: config.currency.as_str().to_string(),
        pack_size: config.pack_size,
        label: product_label(config),
        display: display_amount(config.unit_price_minor, &config.currency),
        interval: (config.mode == CheckoutMode::Subscription).then_some("month"),
    })
}

/// Create a checkout session for the authenticated caller
///
/// `successUrl` / `cancelUrl` come from the query string or a
/// form-encoded body; the query string wins. An optional
/// `Idempotency-Key` header is forwarded to the provider.
#[instrument(skip_all)]
pub async fn create_checkout(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CheckoutSession>, ApiError> {
    let from_query = CheckoutParams::from_urlencoded(query.unwrap_or_default().as_bytes())?;
    let from_body = if is_form(&headers) {
        CheckoutParams::from_urlencoded(&body)?
    } else {
        CheckoutParams::default()
    };
    let params = from_query.or(from_body);

    let mut request = CheckoutRequest {
        success_url: params.success_url,
        cancel_url: params.cancel_url,
        ..CheckoutRequest::default()
    };
    if let Some(principal) = principal {
        request = request.with_principal(principal);
    }
    if let Some(key) = headers.get(IDEMPOTENCY_KEY_HEADER) {
        let key = key.to_str().map_err(|_| {
            ApiError::invalid_request("Idempotency-Key must contain only visible ASCII characters")
        })?;
        request = request.with_idempotency_key(key);
    }

    let session = state.checkout.create_checkout(request).await?;

    info!(session_id = %session.id, "Checkout session issued");

    Ok(Json(session))
}

/// Unrouted paths, including the reserved webhook path
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.trim()
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_precedence() {
        let query = CheckoutParams::from_urlencoded(b"successUrl=https%3A%2F%2Fq.com").unwrap();
        let body = CheckoutParams::from_urlencoded(
            b"successUrl=https%3A%2F%2Fb.com&cancelUrl=https%3A%2F%2Fc.com&_csrf=ignored",
        )
        .unwrap();

        let merged = query.or(body);
        assert_eq!(merged.success_url.as_deref(), Some("https://q.com"));
        assert_eq!(merged.cancel_url.as_deref(), Some("https://c.com"));
    }

    #[test]
    fn test_params_empty_and_malformed() {
        let empty = CheckoutParams::from_urlencoded(b"").unwrap();
        assert!(empty.success_url.is_none());

        assert!(CheckoutParams::from_urlencoded(b"successUrl=a&successUrl=b").is_err());
    }

    #[test]
    fn test_is_form() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap(),
        );
        assert!(is_form(&headers));

        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        assert!(!is_form(&headers));
    }
}
