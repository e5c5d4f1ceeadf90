//! # CSRF Protection
//!
//! Signed double-submit tokens. A token is issued by
//! `GET /api/public/csrf`, stored by the browser in the `XSRF-TOKEN`
//! cookie, and echoed by the client in the `X-XSRF-TOKEN` header on every
//! state-changing request.
//!
//! ```text
//! token = <issued_at>.<nonce>.<hex(HMAC-SHA256(secret, "<issued_at>.<nonce>"))>
//! ```
//!
//! A request passes when the header equals the cookie, the signature
//! verifies under this process's key, and the token is younger than the
//! configured TTL.

use crate::error::ApiError;
use crate::security::chain::{Filter, Outcome};
use crate::security::policy::{CsrfPolicy, PolicyError, SecurityPolicy};
use async_trait::async_trait;
use axum::extract::Request;
use axum::http::{header, HeaderMap, Method};
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use cookie::{time, Cookie, SameSite};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::warn;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

pub const CSRF_COOKIE: &str = "XSRF-TOKEN";
pub const CSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Tokens issued this far in the future are still accepted (clock skew)
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Issues and verifies anti-forgery tokens
pub struct CsrfTokens {
    mac: HmacSha256,
    ttl_secs: i64,
    same_site: SameSite,
    secure: bool,
}

impl CsrfTokens {
    pub fn new(policy: &CsrfPolicy) -> Result<Self, PolicyError> {
        let mac = HmacSha256::new_from_slice(policy.secret.expose_secret().as_bytes())
            .map_err(|_| PolicyError::CsrfKey)?;

        let ttl_secs = i64::try_from(policy.ttl.as_secs()).map_err(|_| {
            PolicyError::InvalidSetting {
                name: "CSRF_TOKEN_TTL_SECS",
                value: policy.ttl.as_secs().to_string(),
            }
        })?;

        Ok(Self {
            mac,
            ttl_secs,
            same_site: policy.same_site,
            secure: policy.secure_cookie(),
        })
    }

    /// Issue a fresh token
    pub fn issue(&self) -> String {
        self.issue_at(Utc::now())
    }

    pub fn issue_at(&self, now: DateTime<Utc>) -> String {
        let payload = format!("{}.{}", now.timestamp(), Uuid::new_v4().simple());
        let signature = self.sign(&payload);
        format!("{}.{}", payload, signature)
    }

    /// `Set-Cookie` value carrying the token
    ///
    /// Not `HttpOnly`: the client script must read it to echo the header.
    pub fn cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build((CSRF_COOKIE, token.to_string()))
            .path("/")
            .max_age(time::Duration::seconds(self.ttl_secs))
            .same_site(self.same_site)
            .secure(self.secure)
            .build()
    }

    pub fn verify(&self, token: &str) -> bool {
        self.verify_at(token, Utc::now())
    }

    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        let Some((payload, signature)) = token.rsplit_once('.') else {
            return false;
        };
        let Some((issued_at, nonce)) = payload.split_once('.') else {
            return false;
        };
        let Ok(issued_at) = issued_at.parse::<i64>() else {
            return false;
        };
        if nonce.is_empty() {
            return false;
        }
        let Ok(signature) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        if mac.verify_slice(&signature).is_err() {
            return false;
        }

        let age = now.timestamp() - issued_at;
        age >= -MAX_CLOCK_SKEW_SECS && age <= self.ttl_secs
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Read a cookie value from the request's `Cookie` headers
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

fn is_state_changing(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

/// Chain stage rejecting state-changing requests without a valid token
pub struct CsrfCheck {
    policy: Arc<SecurityPolicy>,
    tokens: Arc<CsrfTokens>,
}

impl CsrfCheck {
    pub fn new(policy: Arc<SecurityPolicy>, tokens: Arc<CsrfTokens>) -> Self {
        Self { policy, tokens }
    }

    fn is_valid(&self, headers: &HeaderMap) -> bool {
        let Some(header_token) = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok()) else {
            return false;
        };
        let Some(cookie_token) = cookie_value(headers, CSRF_COOKIE) else {
            return false;
        };

        let matches: bool = header_token
            .as_bytes()
            .ct_eq(cookie_token.as_bytes())
            .into();

        matches && self.tokens.verify(header_token)
    }
}

#[async_trait]
impl Filter for CsrfCheck {
    fn name(&self) -> &'static str {
        "csrf"
    }

    async fn before(&self, request: &mut Request) -> Outcome {
        if !is_state_changing(request.method())
            || self.policy.csrf.is_bypassed(request.uri().path())
        {
            return Outcome::Continue;
        }

        if self.is_valid(request.headers()) {
            Outcome::Continue
        } else {
            warn!(
                method = %request.method(),
                path = request.uri().path(),
                "Rejected request without a valid CSRF token"
            );
            Outcome::Terminate(
                ApiError::authorization_denied("Invalid or missing CSRF token.").into_response(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use chrono::Duration;

    fn tokens() -> CsrfTokens {
        CsrfTokens::new(&CsrfPolicy::new("test-secret")).unwrap()
    }

    #[test]
    fn test_issued_token_verifies() {
        let tokens = tokens();
        let token = tokens.issue();

        assert_eq!(token.split('.').count(), 3);
        assert!(tokens.verify(&token));
    }

    #[test]
    fn test_tampered_token_rejected() {
        let tokens = tokens();
        let token = tokens.issue();

        let (payload, _) = token.rsplit_once('.').unwrap();
        let forged = format!("{}.{}", payload, "00".repeat(32));
        assert!(!tokens.verify(&forged));

        let (_, rest) = token.split_once('.').unwrap();
        let backdated = format!("1.{}", rest);
        assert!(!tokens.verify(&backdated));

        assert!(!tokens.verify(""));
        assert!(!tokens.verify("a.b"));
        assert!(!tokens.verify("x.y.zz"));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other = CsrfTokens::new(&CsrfPolicy::new("another-secret")).unwrap();
        assert!(!tokens().verify(&other.issue()));
    }

    #[test]
    fn test_expiry() {
        let tokens = tokens();
        let issued = Utc::now() - Duration::hours(13);
        let token = tokens.issue_at(issued);

        assert!(tokens.verify_at(&token, issued + Duration::hours(11)));
        assert!(!tokens.verify(&token));
        assert!(!tokens.verify_at(&token, issued - Duration::minutes(5)));
    }

    #[test]
    fn test_cookie_attributes() {
        let mut policy = CsrfPolicy::new("s");
        let cookie = CsrfTokens::new(&policy).unwrap().cookie("abc");
        assert_eq!(cookie.name(), CSRF_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(time::Duration::seconds(43_200)));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.secure(), Some(false));
        assert_eq!(cookie.http_only(), None);

        let header = cookie.to_string();
        assert!(header.starts_with("XSRF-TOKEN=abc;"));
        assert!(!header.contains("HttpOnly"));
        assert!(!header.contains("Secure"));

        policy.same_site = SameSite::None;
        let cookie = CsrfTokens::new(&policy).unwrap().cookie("abc");
        assert_eq!(cookie.same_site(), Some(SameSite::None));
        assert_eq!(cookie.secure(), Some(true));
        assert!(cookie.to_string().contains("SameSite=None"));
    }

    #[test]
    fn test_cookie_value() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("theme=dark; XSRF-TOKEN=t1"));
        headers.append(header::COOKIE, HeaderValue::from_static("other=1"));

        assert_eq!(cookie_value(&headers, "XSRF-TOKEN").as_deref(), Some("t1"));
        assert_eq!(cookie_value(&headers, "other").as_deref(), Some("1"));
        assert_eq!(cookie_value(&headers, "missing"), None);

        let mut malformed = HeaderMap::new();
        malformed.insert(header::COOKIE, HeaderValue::from_static("junk; XSRF-TOKEN=t2"));
        assert_eq!(cookie_value(&malformed, "XSRF-TOKEN").as_deref(), Some("t2"));
    }

    #[test]
    fn test_safe_methods() {
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::OPTIONS));
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::DELETE));
    }
}
