use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use viewshift_core::error::{CoreError, ErrorCode};
use viewshift_pipeline::error::BatchError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for request problems and [`BatchError`] for
/// generation problems. Implements [`IntoResponse`] to produce the
/// `{error, message, details?}` body with the status fixed by the code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `viewshift_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A batch failure from `viewshift_pipeline`.
    #[error(transparent)]
    Batch(#[from] BatchError),

    /// The body could not be parsed as a request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The whole request ran past its time budget (seconds).
    #[error("Request timed out after {0} seconds")]
    RequestTimeout(u64),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// Wire body of every failed response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message, details) = match &self {
            // --- Request errors ---
            AppError::Core(core) => (core.code(), core_message(core), None),
            AppError::BadRequest(msg) => (ErrorCode::ValidationError, msg.clone(), None),

            // --- Generation errors ---
            AppError::Batch(BatchError::Core(core)) => (core.code(), core_message(core), None),
            AppError::Batch(BatchError::MalformedTemplate(msg)) => {
                tracing::error!(error = %msg, "Malformed job template");
                (ErrorCode::ServerError, INTERNAL_MESSAGE.to_string(), None)
            }
            AppError::Batch(batch) => {
                tracing::warn!(code = %batch.code(), error = %batch, "Batch failed");
                (batch.code(), batch.to_string(), batch.details())
            }

            AppError::RequestTimeout(secs) => {
                tracing::warn!(timeout_secs = secs, "Request timed out");
                (ErrorCode::Timeout, self.to_string(), None)
            }
        };

        let status = StatusCode::from_u16(code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: code,
            message,
            details,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// The client-facing message of a core error, without the variant prefix.
fn core_message(err: &CoreError) -> String {
    match err {
        CoreError::Validation(msg)
        | CoreError::InvalidParameter(msg)
        | CoreError::InvalidImage(msg) => msg.clone(),
    }
}
