//! # CORS
//!
//! Cross-origin checks for the filter chain. Preflights are answered here
//! for every path so they never reach identity checks. Actual requests
//! from untrusted origins are refused before a handler can act on them.

use crate::error::ApiError;
use crate::security::chain::{Filter, Outcome, RequestHead};
use crate::security::policy::SecurityPolicy;
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct CorsCheck {
    policy: Arc<SecurityPolicy>,
}

impl CorsCheck {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }

    fn preflight(&self, origin: Option<&str>, headers: &HeaderMap) -> Response {
        let cors = &self.policy.cors;
        let mut response = StatusCode::OK.into_response();

        let Some(origin) = origin else {
            return response;
        };

        let requested_method = headers
            .get(header::ACCESS_CONTROL_REQUEST_METHOD)
            .and_then(|v| v.to_str().ok())
            .and_then(|m| Method::from_bytes(m.trim().as_bytes()).ok());
        let requested_headers = headers
            .get(header::ACCESS_CONTROL_REQUEST_HEADERS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        let allowed = cors.is_origin_allowed(origin)
            && requested_method.is_some_and(|m| cors.is_method_allowed(&m))
            && cors.are_headers_allowed(requested_headers);

        if !allowed {
            debug!(origin, "Preflight not granted");
            return response;
        }

        let out = response.headers_mut();
        if let Ok(methods) = HeaderValue::from_str(&cors.methods_value()) {
            out.insert(header::ACCESS_CONTROL_ALLOW_METHODS, methods);
        }
        if !requested_headers.trim().is_empty() {
            if let Ok(value) = HeaderValue::from_str(requested_headers) {
                out.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, value);
            }
        }
        out.insert(
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from(cors.max_age.as_secs()),
        );

        response
    }
}

fn origin_of(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::ORIGIN).and_then(|v| v.to_str().ok())
}

/// An `Origin` naming this very host is not a cross-origin request
fn is_same_origin(origin: &str, headers: &HeaderMap) -> bool {
    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    match (origin.split_once("://"), host) {
        (Some((_, authority)), Some(host)) => authority.eq_ignore_ascii_case(host),
        _ => false,
    }
}

#[async_trait]
impl Filter for CorsCheck {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn before(&self, request: &mut Request) -> Outcome {
        let headers = request.headers();
        let origin = origin_of(headers);

        if request.method() == Method::OPTIONS {
            return Outcome::Terminate(self.preflight(origin, headers));
        }

        let Some(origin) = origin else {
            return Outcome::Continue;
        };
        if is_same_origin(origin, headers) {
            return Outcome::Continue;
        }

        let cors = &self.policy.cors;
        if cors.is_origin_allowed(origin) && cors.is_method_allowed(request.method()) {
            Outcome::Continue
        } else {
            warn!(origin, method = %request.method(), "Rejected cross-origin request");
            Outcome::Terminate(ApiError::authorization_denied("Invalid CORS request").into_response())
        }
    }

    fn after(&self, head: &RequestHead, response: &mut Response) {
        let Some(origin) = origin_of(&head.headers) else {
            return;
        };

        let headers = response.headers_mut();
        headers.append(header::VARY, HeaderValue::from_static("Origin"));

        // A refused preflight gets no grant at all
        let refused_preflight = head.method == Method::OPTIONS
            && !headers.contains_key(header::ACCESS_CONTROL_ALLOW_METHODS);

        if !self.policy.cors.is_origin_allowed(origin) || refused_preflight {
            return;
        }

        if let Ok(value) = HeaderValue::from_str(origin) {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
        }
    }
}
