use crate::services::shortener::ShortenerError;
use crate::services::storage::StorageError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

/// Body of every failed response.
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Staging(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    UpstreamTimeout(String),

    #[error("{0}")]
    Parse(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Staging(_)
            | AppError::Configuration(_)
            | AppError::Upstream(_)
            | AppError::UpstreamTimeout(_)
            | AppError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        let message = err.to_string();
        match err {
            StorageError::Client(_) | StorageError::Region(_) => AppError::Configuration(message),
            StorageError::Upload(_) | StorageError::PreAuth(_) => AppError::Upstream(message),
            StorageError::Timeout { .. } => AppError::UpstreamTimeout(message),
            StorageError::Parse(_) => AppError::Parse(message),
        }
    }
}

impl From<ShortenerError> for AppError {
    fn from(err: ShortenerError) -> Self {
        let message = err.to_string();
        match err {
            ShortenerError::Request(_) | ShortenerError::Status(_) => AppError::Upstream(message),
            ShortenerError::Timeout(_) => AppError::UpstreamTimeout(message),
            ShortenerError::Parse(_) => AppError::Parse(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(kind = ?self, "Request failed: {}", message);
        } else {
            tracing::warn!("Request rejected ({}): {}", status, message);
        }

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PayloadTooLarge("x".into()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::Parse("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_storage_error_conversion() {
        let err: AppError = StorageError::Upload("connection reset".into()).into();
        assert!(matches!(err, AppError::Upstream(_)));
        assert_eq!(err.to_string(), "Failed to upload file: connection reset");

        let err: AppError = StorageError::Region("no region in profile".into()).into();
        assert!(matches!(err, AppError::Configuration(_)));

        let err: AppError = StorageError::Timeout {
            operation: "PutObject",
            after: Duration::from_secs(30),
        }
        .into();
        assert!(matches!(err, AppError::UpstreamTimeout(_)));
        assert!(err.to_string().contains("PutObject"));
    }

    #[test]
    fn test_shortener_error_conversion() {
        let err: AppError = ShortenerError::Status(StatusCode::BAD_GATEWAY).into();
        assert!(matches!(err, AppError::Upstream(_)));
        assert_eq!(err.to_string(), "failed to generate tiny URL: 502 Bad Gateway");

        let err: AppError = ShortenerError::Parse("expected value".into()).into();
        assert!(matches!(err, AppError::Parse(_)));
    }
}
