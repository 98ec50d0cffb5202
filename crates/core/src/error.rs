use serde::Serialize;

/// Errors raised before any job reaches the engine.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The request has the wrong shape (missing or empty fields).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A value is outside its allowed range or has the wrong type.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The source image could not be decoded or is not a known format.
    #[error("Invalid image: {0}")]
    InvalidImage(String),
}

impl CoreError {
    /// Wire classification of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::Validation(_) => ErrorCode::ValidationError,
            CoreError::InvalidParameter(_) => ErrorCode::InvalidParams,
            CoreError::InvalidImage(_) => ErrorCode::InvalidImage,
        }
    }
}

/// Error codes exposed in the `error` field of failed responses.
///
/// Every failure the service can produce is classified into exactly one of
/// these codes, and each code has a fixed HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    InvalidImage,
    InvalidParams,
    GenerationError,
    ModelError,
    ServiceUnavailable,
    Timeout,
    ServerError,
}

impl ErrorCode {
    /// The snake_case wire name, e.g. `"invalid_params"`.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "validation_error",
            ErrorCode::InvalidImage => "invalid_image",
            ErrorCode::InvalidParams => "invalid_params",
            ErrorCode::GenerationError => "generation_error",
            ErrorCode::ModelError => "model_error",
            ErrorCode::ServiceUnavailable => "service_unavailable",
            ErrorCode::Timeout => "timeout",
            ErrorCode::ServerError => "server_error",
        }
    }

    /// HTTP status code used when the error is returned over HTTP.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorCode::ValidationError | ErrorCode::InvalidImage | ErrorCode::InvalidParams => 400,
            ErrorCode::GenerationError | ErrorCode::ServerError => 500,
            ErrorCode::ServiceUnavailable | ErrorCode::ModelError => 503,
            ErrorCode::Timeout => 504,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
