//! # API Errors
//!
//! Every error leaving the service has the same shape:
//!
//! ```json
//! {"error": {"code": "invalid_request", "message": "successUrl must not be blank"}}
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gate_core::{CheckoutError, ErrorCode};
use serde::Serialize;

/// Error response carrying a stable wire code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Filter-chain rejection (403)
    pub fn authorization_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthorizationDenied, message)
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: ErrorCode,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: &self.message,
            },
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        Self::new(err.code(), err.client_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::invalid_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::authorization_denied("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::from(CheckoutError::provider("stripe", "declined")).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_internal_detail_hidden() {
        let err = ApiError::from(CheckoutError::Network("connect error to 10.0.0.3".to_string()));

        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, gate_core::SERVER_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_body_shape() {
        let response = ApiError::invalid_request("successUrl must not be blank").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "error": {"code": "invalid_request", "message": "successUrl must not be blank"}
            })
        );
    }
}
