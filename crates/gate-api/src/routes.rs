//! # Routes
//!
//! Axum router configuration for the billing API.

use crate::handlers;
use crate::security::enforce;
use crate::state::AppState;
use axum::{
    http::{header, HeaderName},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    sensitive_headers::{SetSensitiveRequestHeadersLayer, SetSensitiveResponseHeadersLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - GET  /health - Health check
/// - Public:
///   - GET  /api/public/csrf - Issue a CSRF token
///   - GET  /api/public/pricing - Display pricing
/// - Billing (principal + CSRF token required):
///   - POST /api/billing/checkout - Create checkout session
///
/// Every request, routed or not, passes through the filter chain.
pub fn create_router(state: AppState) -> Router {
    let sensitive: Arc<[HeaderName]> = Arc::new([
        header::AUTHORIZATION,
        header::COOKIE,
        header::SET_COOKIE,
        HeaderName::from_static("x-xsrf-token"),
    ]);

    let public_routes = Router::new()
        .route("/csrf", get(handlers::csrf_token))
        .route("/pricing", get(handlers::pricing));

    let billing_routes = Router::new().route("/checkout", post(handlers::create_checkout));

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        .nest("/api/public", public_routes)
        .nest("/api/billing", billing_routes)
        // Includes the reserved webhook path
        .fallback(handlers::not_found)
        // Middleware (innermost first)
        .layer(middleware::from_fn_with_state(state.chain.clone(), enforce))
        .layer(SetSensitiveResponseHeadersLayer::from_shared(sensitive.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::from_shared(sensitive))
        // State
        .with_state(state)
}
