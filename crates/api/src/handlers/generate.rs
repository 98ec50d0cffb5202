//! Handler for multi-perspective generation.
//!
//! Routes:
//! - `POST /api/generate` -- one image per perspective from a source image

use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use viewshift_core::error::CoreError;
use viewshift_core::generation::{SeedInput, DEFAULT_CFG_SCALE, DEFAULT_STEPS, MAX_STEPS, MIN_STEPS};
use viewshift_core::perspective::Perspective;
use viewshift_core::source_image::{decode_source_image, encode_base64};
use viewshift_pipeline::batch::{BatchCoordinator, BatchRequest, BatchResult};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Request body of `POST /api/generate`.
///
/// Numeric fields stay as raw JSON so a wrong type is reported as
/// `invalid_params` rather than a parse failure.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub perspectives: Vec<PerspectiveInput>,
    #[serde(default)]
    pub steps: Option<Value>,
    #[serde(default)]
    pub cfg_scale: Option<Value>,
    #[serde(default)]
    pub seed: Option<Value>,
}

/// One perspective as sent by the client. `id` and `name` fall back to the
/// position in the list.
#[derive(Debug, Deserialize)]
pub struct PerspectiveInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prompt: String,
}

#[derive(Debug, Serialize)]
pub struct GeneratedImage {
    pub perspective_id: String,
    pub perspective_name: String,
    /// Base64-encoded image bytes.
    pub image: String,
    pub seed_used: String,
}

/// Response body of a successful `POST /api/generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub images: Vec<GeneratedImage>,
    /// Seconds, rounded to two decimals.
    pub total_time: f64,
    /// Base64 of the decoded source image.
    pub original_image: String,
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /api/generate
///
/// Validates the request, decodes the source image, checks the engine,
/// uploads the image once and runs the batch. Either every perspective
/// produces an image or a single error is returned. The engine work is
/// bounded by `REQUEST_TIMEOUT_SECS`; the unfinished job is abandoned.
pub async fn generate(
    State(state): State<AppState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> AppResult<Json<GenerateResponse>> {
    let Json(input) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let encoded_image = input.image.unwrap_or_default();
    if encoded_image.trim().is_empty() {
        return Err(CoreError::Validation("image is required".to_string()).into());
    }

    let mut request = BatchRequest {
        source_image_ref: String::new(),
        perspectives: to_perspectives(input.perspectives),
        steps: parse_steps(input.steps.as_ref())?,
        cfg_scale: parse_cfg_scale(input.cfg_scale.as_ref())?,
        seed: parse_seed(input.seed)?,
        output_prefix: state.config.output_prefix.clone(),
    };
    BatchCoordinator::validate(&request)?;

    let source = decode_source_image(&encoded_image)?;

    let budget_secs = state.config.request_timeout_secs;
    let work = async {
        state.coordinator.ensure_engine_ready().await?;
        request.source_image_ref = state.coordinator.upload_source(&source).await?;

        tracing::info!(
            perspectives = request.perspectives.len(),
            source_ref = %request.source_image_ref,
            "Generation request accepted",
        );

        state.coordinator.run_batch(request).await
    };

    let result = tokio::time::timeout(Duration::from_secs(budget_secs), work)
        .await
        .map_err(|_| AppError::RequestTimeout(budget_secs))??;

    Ok(Json(to_response(result, &source.bytes)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_perspectives(inputs: Vec<PerspectiveInput>) -> Vec<Perspective> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, p)| {
            let id = p
                .id
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| index.to_string());
            let name = p
                .name
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| format!("Perspective {}", index + 1));
            Perspective::new(id, name, p.prompt)
        })
        .collect()
}

/// `steps` must be a JSON integer; range is checked by the coordinator.
fn parse_steps(value: Option<&Value>) -> Result<i64, CoreError> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_STEPS as i64),
        Some(v) => v.as_i64().ok_or_else(|| {
            CoreError::InvalidParameter(format!(
                "steps must be an integer between {MIN_STEPS} and {MAX_STEPS}"
            ))
        }),
    }
}

/// `cfg_scale` must be a JSON number; range is checked by the coordinator.
fn parse_cfg_scale(value: Option<&Value>) -> Result<f64, CoreError> {
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_CFG_SCALE),
        Some(v) => v.as_f64().ok_or_else(|| {
            CoreError::InvalidParameter("cfg_scale must be a number between 1.0 and 5.0".to_string())
        }),
    }
}

fn parse_seed(value: Option<Value>) -> Result<Option<SeedInput>, CoreError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => serde_json::from_value::<SeedInput>(v)
            .map(Some)
            .map_err(|_| {
                CoreError::InvalidParameter(
                    "seed must be a non-negative integer or a numeric string".to_string(),
                )
            }),
    }
}

fn to_response(result: BatchResult, source_bytes: &[u8]) -> GenerateResponse {
    GenerateResponse {
        images: result
            .images
            .into_iter()
            .map(|image| GeneratedImage {
                perspective_id: image.perspective_id,
                perspective_name: image.perspective_name,
                image: encode_base64(&image.image_bytes),
                seed_used: image.seed_used,
            })
            .collect(),
        total_time: (result.total_elapsed_secs * 100.0).round() / 100.0,
        original_image: encode_base64(source_bytes),
    }
}
