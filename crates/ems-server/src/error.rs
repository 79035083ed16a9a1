//! HTTP error mapping.
//!
//! Every failure surfaces as the `{success: false, message}` envelope
//! with a status derived from the error category. Server-side detail is
//! logged, never echoed.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use ems_auth::{AuthError, DirectoryError};
use ems_core::{ApiResponse, CoreError};
use ems_storage::StorageError;

#[derive(Debug)]
pub struct ApiError(pub CoreError);

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self(CoreError::validation(field, message))
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self(CoreError::not_found(entity, id))
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self(CoreError::unauthorized(message))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self(CoreError::from(err))
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        Self(CoreError::from(err))
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        Self(CoreError::from(err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(&err);

        // Client errors carry their own safe message; server errors are
        // logged in full and replaced with a sanitized one.
        let message = if err.is_server_error() {
            error!(error = %err, category = %err.category(), "request failed");
            sanitized_message(&err)
        } else {
            warn!(error = %err, status = %status.as_u16(), "request rejected");
            err.to_string()
        };

        let mut response =
            (status, Json(ApiResponse::<()>::error(message))).into_response();

        if let CoreError::RateLimited { retry_after_secs } = err
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        response
    }
}

fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::Validation { .. } | CoreError::Json(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        CoreError::Conflict { .. } => StatusCode::CONFLICT,
        CoreError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        CoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
        CoreError::Configuration(_) | CoreError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn sanitized_message(err: &CoreError) -> String {
    match err {
        CoreError::Upstream(_) => "Upstream service error".to_string(),
        _ => "Internal server error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&CoreError::validation("name", "required")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&CoreError::not_found("License", 9)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&CoreError::conflict("Ticket", "duplicate")),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&CoreError::RateLimited { retry_after_secs: 30 }),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_for(&CoreError::Upstream("boom".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_rate_limited_carries_retry_after() {
        let response =
            ApiError(CoreError::RateLimited { retry_after_secs: 12 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("12")
        );
    }

    #[tokio::test]
    async fn test_unauthorized_body_is_message_verbatim() {
        let response = ApiError::unauthorized("Authentication required").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "Authentication required");
    }

    #[tokio::test]
    async fn test_server_error_is_sanitized() {
        let response = ApiError(CoreError::internal("secret pool state")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
    }
}
