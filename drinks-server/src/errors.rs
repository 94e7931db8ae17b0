use crate::auth::{AuthError, JwksError};
use crate::store::StoreError;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::response::IntoResponse;
use axum::Json;
use http::StatusCode;
use log::error;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Every way a request can fail, each mapped to one JSON error envelope
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("resource not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Reserved: no handler currently rejects a request as unprocessable
    #[allow(dead_code)]
    #[error("unprocessable")]
    Unprocessable,
    #[error("internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create new Bad Request Error (400) with a detail message
    pub fn bad_request<S: ToString>(detail: S) -> Self {
        Self::BadRequest(detail.to_string())
    }

    /// Create new Internal Server Error (500) with a detail message
    pub fn internal<S: ToString>(detail: S) -> Self {
        Self::Internal(detail.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Auth(err) => err.status_code(),
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unprocessable => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidRecipe(e) => Self::bad_request(e),
            other => Self::internal(other),
        }
    }
}

impl From<JwksError> for ApiError {
    fn from(err: JwksError) -> Self {
        Self::internal(err)
    }
}

impl From<BytesRejection> for ApiError {
    fn from(rejection: BytesRejection) -> Self {
        match rejection.status() {
            StatusCode::PAYLOAD_TOO_LARGE => Self::PayloadTooLarge,
            _ => Self::bad_request(rejection.body_text()),
        }
    }
}

/// A path segment that cannot be extracted names no resource
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}

/// Body of every error response
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct ErrorBody {
    /// Always false
    pub success: bool,
    /// HTTP status code
    pub error: u16,
    /// Machine readable reason, present on authorization failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Human readable description
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();
        let (code, message) = match &self {
            Self::Auth(err) => (Some(err.code().to_string()), err.to_string()),
            Self::BadRequest(detail) => (None, detail.clone()),
            Self::Internal(detail) => {
                // The detail stays in the log, clients get a generic message
                error!("Request failed: {detail}");
                (None, "internal server error".to_string())
            }
            other => (None, other.to_string()),
        };

        let body = ErrorBody {
            success: false,
            error: status_code.as_u16(),
            code,
            message,
        };
        (status_code, Json(body)).into_response()
    }
}

/// Fallback for routes that do not exist
pub(crate) async fn not_found() -> ApiError {
    ApiError::NotFound
}

/// Fallback for known routes called with an unsupported method
pub(crate) async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ApiError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_envelope() {
        let (status, body) = render(ApiError::NotFound).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert_eq!(body.error, 404);
        assert_eq!(body.message, "resource not found");
        assert_eq!(body.code, None);
    }

    #[tokio::test]
    async fn test_unprocessable_envelope() {
        let (status, body) = render(ApiError::Unprocessable).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, 422);
        assert_eq!(body.message, "unprocessable");
    }

    #[tokio::test]
    async fn test_rejection_envelopes() {
        let (status, body) = render(ApiError::MethodNotAllowed).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body.error, 405);
        assert_eq!(body.message, "method not allowed");

        let (status, body) = render(ApiError::PayloadTooLarge).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body.error, 413);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let (status, body) = render(ApiError::internal("disk I/O error")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, 500);
        assert_eq!(body.message, "internal server error");
    }

    #[tokio::test]
    async fn test_auth_error_envelope() {
        let (status, body) = render(AuthError::PermissionNotFound.into()).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, 403);
        assert_eq!(body.code.as_deref(), Some("unauthorized"));
        assert_eq!(body.message, "Permission not found.");
    }
}
