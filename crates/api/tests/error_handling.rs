//! Tests for `AppError` → HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no server needed.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use viewshift_api::error::AppError;
use viewshift_comfyui::orchestrator::FailureKind;
use viewshift_core::error::CoreError;
use viewshift_pipeline::error::{BatchError, PerspectiveFailure};

/// Helper: convert an `AppError` into its status code and parsed JSON body.
async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

fn perspective_failure(kind: FailureKind, message: &str) -> AppError {
    AppError::Batch(BatchError::Perspective {
        id: "left_45".to_string(),
        name: "Left 45°".to_string(),
        failure: PerspectiveFailure::Failed {
            kind,
            messages: vec![message.to_string()],
        },
    })
}

// ---------------------------------------------------------------------------
// Request errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validation_error_returns_400_without_prefix() {
    let err = AppError::Core(CoreError::Validation("image is required".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
    assert_eq!(json["message"], "image is required");
    assert!(json.get("details").is_none());
}

#[tokio::test]
async fn invalid_parameter_returns_400_invalid_params() {
    let err = AppError::Core(CoreError::InvalidParameter("steps must be ...".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_params");
}

#[tokio::test]
async fn invalid_image_returns_400() {
    let err = AppError::Core(CoreError::InvalidImage("too small".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_image");
}

#[tokio::test]
async fn bad_request_is_validation_error() {
    let (status, json) = error_to_response(AppError::BadRequest("EOF while parsing".into())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

// ---------------------------------------------------------------------------
// Generation errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generation_failure_returns_500_with_details() {
    let err = perspective_failure(FailureKind::GenerationFailed, "VAEDecode (8): boom");

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "generation_error");
    assert_eq!(json["message"], "Generation failed for perspective 'Left 45°'");
    assert_eq!(json["details"], "VAEDecode (8): boom");
}

#[tokio::test]
async fn timeout_returns_504() {
    let err = AppError::Batch(BatchError::Perspective {
        id: "left_45".to_string(),
        name: "Left 45°".to_string(),
        failure: PerspectiveFailure::TimedOut { timeout_secs: 120 },
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"], "timeout");
    assert_eq!(
        json["message"],
        "Generation for perspective 'Left 45°' timed out after 120 seconds"
    );
}

#[tokio::test]
async fn service_unavailable_returns_503() {
    let err = AppError::Batch(BatchError::ServiceUnavailable("ComfyUI is down".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "service_unavailable");
}

#[tokio::test]
async fn batch_validation_error_keeps_its_code() {
    let err = AppError::Batch(BatchError::Core(CoreError::Validation(
        "at least one perspective is required".into(),
    )));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["message"], "at least one perspective is required");
}

// ---------------------------------------------------------------------------
// Internal errors are sanitized
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_template_returns_500_and_sanitizes_message() {
    let err = AppError::Batch(BatchError::MalformedTemplate("node 80 missing filename_prefix".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "server_error");
    assert!(!json.to_string().contains("filename_prefix"));
}

#[tokio::test]
async fn request_timeout_returns_504_timeout() {
    let (status, json) = error_to_response(AppError::RequestTimeout(900)).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"], "timeout");
    assert_eq!(json["message"], "Request timed out after 900 seconds");
}
