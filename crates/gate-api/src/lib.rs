//! # gate-api
//!
//! HTTP API layer for convert-gate.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - Checkout endpoint backed by `gate_core::CheckoutService`
//! - Request filter chain (security headers, CSRF, CORS, authentication, authorization)
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/public/csrf` | Issue a CSRF token |
//! | GET | `/api/public/pricing` | Display pricing |
//! | POST | `/api/billing/checkout` | Create checkout session |

pub mod error;
pub mod handlers;
pub mod routes;
pub mod security;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppConfig, AppState};
