//! Response hardening headers. Never rejects a request.

use crate::security::chain::{Filter, Outcome, RequestHead};
use crate::security::policy::{PolicyError, SecurityPolicy};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, HeaderValue};
use axum::response::Response;

pub struct SecurityHeaders {
    hsts: HeaderValue,
    csp: HeaderValue,
}

impl SecurityHeaders {
    pub fn new(policy: &SecurityPolicy) -> Result<Self, PolicyError> {
        Ok(Self {
            hsts: HeaderValue::from_str(&policy.hsts.header_value())
                .map_err(|_| PolicyError::InvalidHeaderValue("HSTS policy"))?,
            csp: HeaderValue::from_str(&policy.content_security_policy)
                .map_err(|_| PolicyError::InvalidHeaderValue("Content-Security-Policy"))?,
        })
    }
}

#[async_trait]
impl Filter for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security-headers"
    }

    async fn before(&self, _request: &mut Request) -> Outcome {
        Outcome::Continue
    }

    fn after(&self, _head: &RequestHead, response: &mut Response) {
        let headers = response.headers_mut();
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(header::STRICT_TRANSPORT_SECURITY, self.hsts.clone());
        headers.insert(header::CONTENT_SECURITY_POLICY, self.csp.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::policy::CONTENT_SECURITY_POLICY;
    use axum::body::Body;
    use axum::http;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    #[test]
    fn test_decorates_any_response() {
        let policy = SecurityPolicy::from_lookup(|key: &str| {
            (key == "HSTS_INCLUDE_SUBDOMAINS").then(|| "false".to_string())
        })
        .unwrap();
        let stage = SecurityHeaders::new(&policy).unwrap();

        let request = http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let head = RequestHead::of(&request);
        let mut response = StatusCode::FORBIDDEN.into_response();
        stage.after(&head, &mut response);

        let headers = response.headers();
        assert_eq!(headers["x-frame-options"], "DENY");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["strict-transport-security"], "max-age=31536000");
        assert_eq!(headers["content-security-policy"], CONTENT_SECURITY_POLICY);
    }
}
