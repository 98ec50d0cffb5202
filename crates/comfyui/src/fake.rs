//! Scripted [`EngineRuntime`] used by the unit tests in this crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::api::ComfyUIApiError;
use crate::history::{ArtifactRef, JobStatus, NodeOutput};
use crate::runtime::EngineRuntime;
use crate::workflow::{JobGraph, SAVE_IMAGE_NODE};

/// Replays queued responses; falls back to "pending" polls and healthy probes.
#[derive(Default)]
pub struct ScriptedRuntime {
    submits: Mutex<VecDeque<Result<String, ComfyUIApiError>>>,
    polls: Mutex<VecDeque<Result<JobStatus, ComfyUIApiError>>>,
    fetches: Mutex<VecDeque<Result<Vec<u8>, ComfyUIApiError>>>,
    health: Mutex<VecDeque<bool>>,
    poll_delay: Option<Duration>,
    submitted: Mutex<Vec<JobGraph>>,
    poll_count: AtomicUsize,
    cancel_count: AtomicUsize,
    health_count: AtomicUsize,
}

impl ScriptedRuntime {
    pub fn with_submit(self, result: Result<String, ComfyUIApiError>) -> Self {
        self.submits.lock().unwrap().push_back(result);
        self
    }

    pub fn with_poll(self, result: Result<JobStatus, ComfyUIApiError>) -> Self {
        self.polls.lock().unwrap().push_back(result);
        self
    }

    pub fn with_fetch(self, result: Result<Vec<u8>, ComfyUIApiError>) -> Self {
        self.fetches.lock().unwrap().push_back(result);
        self
    }

    pub fn with_health(self, probes: impl IntoIterator<Item = bool>) -> Self {
        self.health.lock().unwrap().extend(probes);
        self
    }

    /// Make every poll take `delay` before answering.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    pub fn submitted(&self) -> Vec<JobGraph> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn polls(&self) -> usize {
        self.poll_count.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancel_count.load(Ordering::SeqCst)
    }

    pub fn health_probes(&self) -> usize {
        self.health_count.load(Ordering::SeqCst)
    }
}

/// A finished history entry whose save node produced `filename`.
pub fn finished(filename: &str) -> JobStatus {
    let output = NodeOutput {
        images: vec![ArtifactRef {
            filename: filename.to_string(),
            subfolder: String::new(),
            kind: "output".to_string(),
        }],
    };
    JobStatus::Finished {
        outputs: [(SAVE_IMAGE_NODE.to_string(), output)].into_iter().collect(),
    }
}

pub fn api_error(status: u16, body: &str) -> ComfyUIApiError {
    ComfyUIApiError::ApiError {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl EngineRuntime for ScriptedRuntime {
    async fn submit(&self, graph: &JobGraph, _client_id: &str) -> Result<String, ComfyUIApiError> {
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(graph.clone());
        let n = submitted.len();
        drop(submitted);
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("prompt-{n}")))
    }

    async fn poll_status(&self, _prompt_id: &str) -> Result<JobStatus, ComfyUIApiError> {
        self.poll_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(JobStatus::NotFound))
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.fetches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(artifact.filename.as_bytes().to_vec()))
    }

    async fn upload_image(&self, _bytes: Vec<u8>, filename: &str) -> Result<String, ComfyUIApiError> {
        Ok(filename.to_string())
    }

    async fn cancel(&self, _prompt_id: &str) -> Result<(), ComfyUIApiError> {
        self.cancel_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        self.health_count.fetch_add(1, Ordering::SeqCst);
        self.health.lock().unwrap().pop_front().unwrap_or(true)
    }
}
