//! # Filter Chain
//!
//! Ordered request pipeline in front of every route.
//!
//! ```text
//! ┌──────────────────┐  ┌──────┐  ┌──────┐  ┌────────────────┐  ┌───────────────┐
//! │ security-headers │─▶│ csrf │─▶│ cors │─▶│ authentication │─▶│ authorization │─▶ handler
//! └──────────────────┘  └──────┘  └──────┘  └────────────────┘  └───────────────┘
//!          ▲                                                              │
//!          └──────────── after() hooks, reverse order ◀───────────────────┘
//! ```
//!
//! Each stage may stop the request with its own response. Whatever the
//! final response is, every stage then gets to decorate it.

use crate::security::authn::{Authentication, IdentityVerifier};
use crate::security::authz::Authorization;
use crate::security::cors::CorsCheck;
use crate::security::csrf::{CsrfCheck, CsrfTokens};
use crate::security::headers::SecurityHeaders;
use crate::security::policy::{PolicyError, SecurityPolicy};
use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use tracing::debug;

/// Result of a stage's `before` hook
pub enum Outcome {
    Continue,
    Terminate(Response),
}

/// Request data kept for the `after` hooks
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
}

impl RequestHead {
    pub fn of(request: &Request) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            headers: request.headers().clone(),
        }
    }
}

/// A named stage of the chain
#[async_trait]
pub trait Filter: Send + Sync {
    fn name(&self) -> &'static str;

    async fn before(&self, request: &mut Request) -> Outcome;

    fn after(&self, _head: &RequestHead, _response: &mut Response) {}
}

/// Ordered list of stages
#[derive(Clone)]
pub struct FilterChain {
    stages: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new(stages: Vec<Arc<dyn Filter>>) -> Self {
        Self { stages }
    }

    /// The production order: headers, csrf, cors, authentication, authorization
    pub fn standard(
        policy: Arc<SecurityPolicy>,
        tokens: Arc<CsrfTokens>,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, PolicyError> {
        Ok(Self::new(vec![
            Arc::new(SecurityHeaders::new(&policy)?),
            Arc::new(CsrfCheck::new(policy.clone(), tokens)),
            Arc::new(CorsCheck::new(policy.clone())),
            Arc::new(Authentication::new(verifier)),
            Arc::new(Authorization::new(policy)),
        ]))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run `before` hooks in order; the first termination wins
    pub async fn evaluate(&self, request: &mut Request) -> Option<Response> {
        for stage in &self.stages {
            if let Outcome::Terminate(response) = stage.before(request).await {
                debug!(
                    stage = stage.name(),
                    status = response.status().as_u16(),
                    "Filter chain terminated request"
                );
                return Some(response);
            }
        }
        None
    }

    /// Run `after` hooks in reverse order
    pub fn finish(&self, head: &RequestHead, response: &mut Response) {
        for stage in self.stages.iter().rev() {
            stage.after(head, response);
        }
    }

    pub async fn handle(&self, mut request: Request, next: Next) -> Response {
        let head = RequestHead::of(&request);

        let mut response = match self.evaluate(&mut request).await {
            Some(response) => response,
            None => next.run(request).await,
        };

        self.finish(&head, &mut response);
        response
    }
}

/// Middleware entry point for `axum::middleware::from_fn_with_state`
pub async fn enforce(
    State(chain): State<Arc<FilterChain>>,
    request: Request,
    next: Next,
) -> Response {
    chain.handle(request, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::authn::NoIdentity;
    use axum::body::Body;
    use axum::http;
    use axum::http::{HeaderValue, StatusCode};
    use axum::response::IntoResponse;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        stop: bool,
    }

    #[async_trait]
    impl Filter for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn before(&self, _request: &mut Request) -> Outcome {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            if self.stop {
                Outcome::Terminate(StatusCode::IM_A_TEAPOT.into_response())
            } else {
                Outcome::Continue
            }
        }

        fn after(&self, _head: &RequestHead, response: &mut Response) {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
            response
                .headers_mut()
                .append("x-stage", HeaderValue::from_static(self.name));
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<String>>>, stop: bool) -> Arc<dyn Filter> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
            stop,
        })
    }

    fn request() -> Request {
        http::Request::builder().uri("/x").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_first_termination_wins() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![
            recorder("a", &log, false),
            recorder("b", &log, true),
            recorder("c", &log, false),
        ]);

        let mut req = request();
        let head = RequestHead::of(&req);
        let mut response = chain.evaluate(&mut req).await.unwrap();
        chain.finish(&head, &mut response);

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["before:a", "before:b", "after:c", "after:b", "after:a"]
        );
        assert_eq!(response.headers().get_all("x-stage").iter().count(), 3);
    }

    #[tokio::test]
    async fn test_all_continue() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![recorder("a", &log, false), recorder("b", &log, false)]);

        assert!(chain.evaluate(&mut request()).await.is_none());
        assert_eq!(*log.lock().unwrap(), vec!["before:a", "before:b"]);
    }

    #[test]
    fn test_standard_order() {
        let policy = Arc::new(SecurityPolicy::from_lookup(|_: &str| None).unwrap());
        let tokens = Arc::new(CsrfTokens::new(&policy.csrf).unwrap());
        let chain = FilterChain::standard(policy, tokens, Arc::new(NoIdentity)).unwrap();

        assert_eq!(
            chain.stage_names(),
            vec!["security-headers", "csrf", "cors", "authentication", "authorization"]
        );
    }
}
