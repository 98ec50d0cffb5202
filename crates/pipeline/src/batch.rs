//! Batch coordinator: one source image, many perspectives, one job at a time.

use std::sync::Arc;

use tokio::time::Instant;
use viewshift_comfyui::orchestrator::{JobOrchestrator, JobOutcome, PollConfig};
use viewshift_comfyui::runtime::EngineRuntime;
use viewshift_comfyui::workflow::{build_template, inject, JobGraph};
use viewshift_core::error::CoreError;
use viewshift_core::generation::{
    validate_cfg_scale, validate_steps, GenerationParameters, SeedInput,
};
use viewshift_core::perspective::{filename_safe_id, validate_perspectives, Perspective};
use viewshift_core::source_image::SourceImage;

use crate::error::{BatchError, PerspectiveFailure};

/// Everything needed to generate one batch.
#[derive(Debug, Clone)]
pub struct BatchRequest {
    /// Engine-side reference to the already uploaded source image.
    pub source_image_ref: String,
    pub perspectives: Vec<Perspective>,
    pub steps: i64,
    pub cfg_scale: f64,
    pub seed: Option<SeedInput>,
    pub output_prefix: String,
}

/// Parameters shared by every job of a validated batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBatch {
    pub steps: u32,
    pub cfg_scale: f64,
    pub seed: Option<SeedInput>,
}

/// One generated view.
#[derive(Debug, Clone)]
pub struct PerspectiveImage {
    pub perspective_id: String,
    pub perspective_name: String,
    pub image_bytes: Vec<u8>,
    /// Resolved sampler seed, as a decimal string.
    pub seed_used: String,
}

/// Result of a batch in which every perspective succeeded.
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// In request order.
    pub images: Vec<PerspectiveImage>,
    pub total_elapsed_secs: f64,
    pub original_image_ref: String,
}

/// Runs batches sequentially against a shared engine.
#[derive(Clone)]
pub struct BatchCoordinator {
    runtime: Arc<dyn EngineRuntime>,
    orchestrator: JobOrchestrator,
    template: JobGraph,
}

impl BatchCoordinator {
    pub fn new(runtime: Arc<dyn EngineRuntime>, poll_config: PollConfig) -> Self {
        let orchestrator = JobOrchestrator::new(runtime.clone(), poll_config);
        Self {
            runtime,
            orchestrator,
            template: build_template(),
        }
    }

    /// Check a request without touching the engine.
    ///
    /// Perspectives are checked first, then `steps`, `cfg_scale` and the seed.
    pub fn validate(request: &BatchRequest) -> Result<ValidatedBatch, CoreError> {
        validate_perspectives(&request.perspectives)?;
        let steps = validate_steps(request.steps)?;
        let cfg_scale = validate_cfg_scale(request.cfg_scale)?;
        let seed = SeedInput::normalize(request.seed.clone());
        if let Some(seed) = &seed {
            seed.resolve()?;
        }
        Ok(ValidatedBatch {
            steps,
            cfg_scale,
            seed,
        })
    }

    /// Fail with [`BatchError::ServiceUnavailable`] unless the engine answers.
    pub async fn ensure_engine_ready(&self) -> Result<(), BatchError> {
        if self.runtime.is_healthy().await {
            Ok(())
        } else {
            Err(BatchError::ServiceUnavailable(
                "ComfyUI service is not available".to_string(),
            ))
        }
    }

    /// Upload the source image once per request and return its engine reference.
    pub async fn upload_source(&self, image: &SourceImage) -> Result<String, BatchError> {
        let filename = format!("source_{}.{}", batch_tag(), image.extension());
        self.runtime
            .upload_image(image.bytes.clone(), &filename)
            .await
            .map_err(|e| {
                tracing::error!(filename = %filename, error = %e, "Source image upload failed");
                BatchError::ServiceUnavailable(format!("Failed to upload source image: {e}"))
            })
    }

    /// Generate every perspective of `request`, in order.
    ///
    /// Stops at the first failure or timeout; later perspectives are never
    /// submitted and no partial result is returned.
    pub async fn run_batch(&self, request: BatchRequest) -> Result<BatchResult, BatchError> {
        let validated = Self::validate(&request)?;
        let tag = batch_tag();
        let total = request.perspectives.len();

        tracing::info!(
            batch_tag = %tag,
            perspectives = total,
            steps = validated.steps,
            cfg_scale = validated.cfg_scale,
            "Starting batch",
        );

        let started = Instant::now();
        let mut images = Vec::with_capacity(total);

        for (index, perspective) in request.perspectives.iter().enumerate() {
            let params = GenerationParameters {
                input_image_ref: request.source_image_ref.clone(),
                prompt: perspective.prompt.clone(),
                steps: validated.steps,
                cfg_scale: validated.cfg_scale,
                seed: validated.seed.clone(),
                output_prefix: format!(
                    "{}_{}_{}",
                    request.output_prefix,
                    tag,
                    filename_safe_id(&perspective.id)
                ),
            };
            let injected = inject(&self.template, &params)?;

            tracing::info!(
                perspective_id = %perspective.id,
                index = index + 1,
                total,
                seed = injected.seed,
                "Generating perspective",
            );

            let failure = match self.orchestrator.run(&injected.graph).await {
                JobOutcome::Success { artifact, .. } => {
                    images.push(PerspectiveImage {
                        perspective_id: perspective.id.clone(),
                        perspective_name: perspective.name.clone(),
                        image_bytes: artifact.bytes,
                        seed_used: injected.seed.to_string(),
                    });
                    continue;
                }
                JobOutcome::Failed { kind, messages } => {
                    PerspectiveFailure::Failed { kind, messages }
                }
                JobOutcome::TimedOut { .. } => PerspectiveFailure::TimedOut {
                    timeout_secs: self.orchestrator.config().timeout.as_secs(),
                },
            };

            let err = BatchError::Perspective {
                id: perspective.id.clone(),
                name: perspective.name.clone(),
                failure,
            };
            tracing::warn!(
                perspective_id = %perspective.id,
                completed = images.len(),
                error = %err,
                "Batch aborted",
            );
            return Err(err);
        }

        let total_elapsed_secs = started.elapsed().as_secs_f64();
        tracing::info!(
            batch_tag = %tag,
            elapsed_ms = (total_elapsed_secs * 1000.0) as u64,
            "Batch completed",
        );

        Ok(BatchResult {
            images,
            total_elapsed_secs,
            original_image_ref: request.source_image_ref,
        })
    }
}

/// Short random tag shared by every artifact of one batch.
fn batch_tag() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
