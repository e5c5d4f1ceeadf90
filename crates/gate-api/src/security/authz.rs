//! Authorization: the first matching access rule decides.

use crate::error::ApiError;
use crate::security::chain::{Filter, Outcome};
use crate::security::policy::{Requirement, SecurityPolicy};
use async_trait::async_trait;
use axum::extract::Request;
use axum::response::IntoResponse;
use gate_core::Principal;
use std::sync::Arc;
use tracing::warn;

pub struct Authorization {
    policy: Arc<SecurityPolicy>,
}

impl Authorization {
    pub fn new(policy: Arc<SecurityPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Filter for Authorization {
    fn name(&self) -> &'static str {
        "authorization"
    }

    async fn before(&self, request: &mut Request) -> Outcome {
        let path = request.uri().path();
        match self.policy.requirement_for(path) {
            Requirement::Public => Outcome::Continue,
            Requirement::Authenticated if request.extensions().get::<Principal>().is_some() => {
                Outcome::Continue
            }
            Requirement::Authenticated => {
                warn!(path, "Rejected unauthenticated request");
                Outcome::Terminate(ApiError::authorization_denied("Access denied.").into_response())
            }
        }
    }
}
