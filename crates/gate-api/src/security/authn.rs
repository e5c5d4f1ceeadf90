//! # Authentication
//!
//! The chain delegates identity to an [`IdentityVerifier`]. Whatever it
//! returns is stored in the request extensions, where
//! [`AuthenticatedPrincipal`] picks it up in handlers.
//!
//! ```text
//! Request → Authentication stage → verifier.authenticate(headers)
//!                                        ↓
//!                         extensions.insert(Principal)
//!                                        ↓
//!              Handler → AuthenticatedPrincipal extractor reads it back
//! ```
//!
//! Token formats are the verifier's business; the stage never inspects them.

use crate::security::chain::{Filter, Outcome};
use crate::security::policy::PolicyError;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use gate_core::Principal;
use std::collections::HashMap;
use std::convert::Infallible;
use std::env;
use std::sync::Arc;
use tracing::debug;

/// Resolves the caller's identity from request headers
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// `None` when the request carries no acceptable credential
    async fn authenticate(&self, headers: &HeaderMap) -> Option<Principal>;
}

/// Verifier that never recognises anyone
pub struct NoIdentity;

#[async_trait]
impl IdentityVerifier for NoIdentity {
    async fn authenticate(&self, _headers: &HeaderMap) -> Option<Principal> {
        None
    }
}

/// Fixed bearer-token table for development and tests
#[derive(Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Parse `token=principal,token=principal`
    ///
    /// Errors name the entry position only; tokens are never echoed.
    pub fn parse(entries: &str) -> Result<Self, PolicyError> {
        entries
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .enumerate()
            .try_fold(Self::new(), |verifier, (position, entry)| {
                match entry.split_once('=') {
                    Some((token, name)) if !token.trim().is_empty() && !name.trim().is_empty() => {
                        Ok(verifier.with_token(token.trim(), Principal::new(name.trim())))
                    }
                    _ => Err(PolicyError::InvalidSetting {
                        name: "IDENTITY_STATIC_TOKENS",
                        value: format!("entry #{}", position + 1),
                    }),
                }
            })
    }

    /// Load `IDENTITY_STATIC_TOKENS` if set
    pub fn from_env() -> Result<Option<Self>, PolicyError> {
        match env::var("IDENTITY_STATIC_TOKENS") {
            Ok(entries) if !entries.trim().is_empty() => Self::parse(&entries).map(Some),
            _ => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityVerifier for StaticTokenVerifier {
    async fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = headers
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))?;

        self.tokens.get(token.trim()).cloned()
    }
}

/// Chain stage attaching the verified principal to the request
pub struct Authentication {
    verifier: Arc<dyn IdentityVerifier>,
}

impl Authentication {
    pub fn new(verifier: Arc<dyn IdentityVerifier>) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl Filter for Authentication {
    fn name(&self) -> &'static str {
        "authentication"
    }

    async fn before(&self, request: &mut Request) -> Outcome {
        if let Some(principal) = self.verifier.authenticate(request.headers()).await {
            debug!(principal = %principal.name, "Authenticated request");
            request.extensions_mut().insert(principal);
        }
        Outcome::Continue
    }
}

/// Extractor for the principal set by the authentication stage
///
/// `None` on public routes reached anonymously.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub Option<Principal>);

impl<S> FromRequestParts<S> for AuthenticatedPrincipal
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Principal>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{self, HeaderValue};

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_parse_tokens() {
        let verifier = StaticTokenVerifier::parse("dev-1=ada@example.com, dev-2 = grace").unwrap();
        assert_eq!(verifier.len(), 2);

        assert!(StaticTokenVerifier::parse("").unwrap().is_empty());
        assert!(StaticTokenVerifier::parse("no-separator").is_err());
        assert!(StaticTokenVerifier::parse("tok=").is_err());
    }

    #[tokio::test]
    async fn test_static_verifier() {
        let verifier = StaticTokenVerifier::new().with_token("t1", Principal::new("ada@example.com"));

        assert_eq!(
            verifier.authenticate(&bearer("t1")).await,
            Some(Principal::new("ada@example.com"))
        );
        assert_eq!(verifier.authenticate(&bearer("t2")).await, None);
        assert_eq!(verifier.authenticate(&HeaderMap::new()).await, None);
        assert_eq!(NoIdentity.authenticate(&bearer("t1")).await, None);
    }

    #[tokio::test]
    async fn test_stage_attaches_principal() {
        let stage = Authentication::new(Arc::new(
            StaticTokenVerifier::new().with_token("t1", Principal::new("ada")),
        ));

        let mut request = http::Request::builder()
            .uri("/api/billing/checkout")
            .header("authorization", "Bearer t1")
            .body(Body::empty())
            .unwrap();
        assert!(matches!(stage.before(&mut request).await, Outcome::Continue));
        assert_eq!(
            request.extensions().get::<Principal>(),
            Some(&Principal::new("ada"))
        );

        let mut anonymous = http::Request::builder().uri("/").body(Body::empty()).unwrap();
        assert!(matches!(stage.before(&mut anonymous).await, Outcome::Continue));
        assert!(anonymous.extensions().get::<Principal>().is_none());
    }
}
