// ABOUTME: HTTP error type that maps store, upload, and stream failures onto status codes.
// ABOUTME: Every error renders as a JSON body of the form {"error": "..."}.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use overlaycast_store::{BlobError, StoreError};
use overlaycast_transcode::StreamError;

/// Result type for HTTP handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// An error that has already been mapped to an HTTP status and a client-facing message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!("overlay store failure: {}", err);
        match err {
            StoreError::Corrupt { .. } => ApiError::internal("overlay storage is corrupt"),
            StoreError::Read { .. } | StoreError::Write { .. } => {
                ApiError::internal("overlay storage unavailable")
            }
        }
    }
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        match err {
            BlobError::MissingPayload | BlobError::InvalidName(_) => {
                ApiError::bad_request(err.to_string())
            }
            BlobError::Io(e) => {
                tracing::error!("failed to save upload: {}", e);
                ApiError::internal("failed to save upload")
            }
        }
    }
}

impl From<StreamError> for ApiError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::MissingSource => ApiError::bad_request(err.to_string()),
            StreamError::AssetNotFound(_) | StreamError::JobNotFound(_) => {
                ApiError::not_found(err.to_string())
            }
            StreamError::Io(e) => {
                tracing::error!("stream session failure: {}", e);
                ApiError::internal("stream session failure")
            }
        }
    }
}
