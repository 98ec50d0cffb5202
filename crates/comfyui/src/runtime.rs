//! The engine boundary consumed by the orchestrator.
//!
//! [`ComfyUIApi`](crate::api::ComfyUIApi) is the production
//! implementation; tests substitute scripted runtimes.

use async_trait::async_trait;

use crate::api::ComfyUIApiError;
use crate::history::{ArtifactRef, JobStatus};
use crate::workflow::JobGraph;

/// Operations the orchestration layer needs from an image-generation engine.
#[async_trait]
pub trait EngineRuntime: Send + Sync {
    /// Queue `graph` for execution and return the engine's job id.
    async fn submit(&self, graph: &JobGraph, client_id: &str) -> Result<String, ComfyUIApiError>;

    /// Look up the status of a previously submitted job.
    async fn poll_status(&self, prompt_id: &str) -> Result<JobStatus, ComfyUIApiError>;

    /// Download the bytes of a produced artifact.
    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError>;

    /// Store a source image in the engine's input area and return the
    /// reference a `LoadImage` node accepts.
    async fn upload_image(&self, bytes: Vec<u8>, filename: &str)
        -> Result<String, ComfyUIApiError>;

    /// Remove a queued or running job. Used after a timeout to free the worker.
    async fn cancel(&self, prompt_id: &str) -> Result<(), ComfyUIApiError>;

    /// Whether the engine currently answers its health probe.
    async fn is_healthy(&self) -> bool;
}
