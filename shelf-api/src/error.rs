//! Error types for shelf-api
//!
//! Every failure after authentication is reported as `400 {"error": "<text>"}`;
//! authentication failures are `403`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shelf_common::api::ApiKeyError;
use thiserror::Error;

use crate::services::platform_client::PlatformError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong API key
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Upstream platform failure
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Common library error
    #[error("Common error: {0}")]
    Common(#[from] shelf_common::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<ApiKeyError> for ApiError {
    fn from(err: ApiKeyError) -> Self {
        match err {
            ApiKeyError::Missing | ApiKeyError::Mismatch => ApiError::Forbidden(err.to_string()),
            ApiKeyError::SecretUnavailable(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::FORBIDDEN {
            tracing::warn!(error = %self, "Rejected request");
        } else {
            tracing::error!(error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(ApiKeyError::Missing).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ApiKeyError::Mismatch).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(ApiKeyError::SecretUnavailable("vault down".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(PlatformError::Api(502, "bad gateway".to_string())).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_platform_error_text_preserved() {
        let err = ApiError::from(PlatformError::Network("connection refused".to_string()));
        assert!(err.to_string().contains("connection refused"));
    }
}
