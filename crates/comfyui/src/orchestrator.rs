//! Drives one job graph from submission to a terminal outcome.
//!
//! A job is submitted once, then its history entry is polled at a fixed
//! interval under a wall-clock budget. When the save node reports an
//! image, the image bytes are fetched and returned. Every ending is an
//! explicit [`JobOutcome`]; nothing in here retries.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::history::{select_artifact, ArtifactRef, JobStatus};
use crate::runtime::EngineRuntime;
use crate::workflow::{JobGraph, SAVE_IMAGE_NODE};

/// Poll schedule and budget for a single job.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between history polls.
    pub interval: Duration,
    /// Wall-clock budget for the polling phase.
    pub timeout: Duration,
    /// Give up after this many consecutive "not found" polls.
    /// `None` keeps polling until the timeout.
    pub max_consecutive_not_found: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
            max_consecutive_not_found: None,
        }
    }
}

/// Why a job failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The engine refused the graph at submission time.
    SubmissionRejected,
    /// The engine accepted the graph but reported an execution failure.
    GenerationFailed,
    /// The engine could not be reached.
    Transport,
}

/// An image produced by the save node.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub reference: ArtifactRef,
    pub bytes: Vec<u8>,
}

/// Terminal result of [`JobOrchestrator::run`].
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Success { prompt_id: String, artifact: Artifact },
    Failed { kind: FailureKind, messages: Vec<String> },
    TimedOut { elapsed_secs: f64 },
}

impl JobOutcome {
    fn failed(kind: FailureKind, message: impl Into<String>) -> Self {
        JobOutcome::Failed {
            kind,
            messages: vec![message.into()],
        }
    }
}

enum PollEnd {
    Done(ArtifactRef),
    Failed(Vec<String>),
}

/// Runs jobs against a shared [`EngineRuntime`].
#[derive(Clone)]
pub struct JobOrchestrator {
    runtime: Arc<dyn EngineRuntime>,
    config: PollConfig,
}

impl JobOrchestrator {
    pub fn new(runtime: Arc<dyn EngineRuntime>, config: PollConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Submit `graph` and wait for it to finish.
    ///
    /// Dropping the returned future abandons the job; the engine is not told.
    pub async fn run(&self, graph: &JobGraph) -> JobOutcome {
        let client_id = uuid::Uuid::new_v4().to_string();

        let prompt_id = match self.runtime.submit(graph, &client_id).await {
            Ok(id) => id,
            Err(e) if e.is_rejection() => {
                tracing::warn!(error = %e, "ComfyUI rejected job");
                return JobOutcome::failed(FailureKind::SubmissionRejected, e.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to submit job to ComfyUI");
                return JobOutcome::failed(FailureKind::Transport, e.to_string());
            }
        };

        tracing::info!(prompt_id = %prompt_id, client_id = %client_id, "Job submitted");

        let started = Instant::now();
        let polled =
            tokio::time::timeout(self.config.timeout, self.poll_until_terminal(&prompt_id)).await;

        let artifact_ref = match polled {
            Ok(PollEnd::Done(artifact_ref)) => artifact_ref,
            Ok(PollEnd::Failed(messages)) => {
                tracing::warn!(prompt_id = %prompt_id, ?messages, "Job failed");
                return JobOutcome::Failed {
                    kind: FailureKind::GenerationFailed,
                    messages,
                };
            }
            Err(_) => {
                let elapsed = started.elapsed();
                tracing::warn!(
                    prompt_id = %prompt_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Job timed out",
                );
                if let Err(e) = self.runtime.cancel(&prompt_id).await {
                    tracing::debug!(prompt_id = %prompt_id, error = %e, "Cancel after timeout failed");
                }
                return JobOutcome::TimedOut {
                    elapsed_secs: elapsed.as_secs_f64(),
                };
            }
        };

        match self.runtime.fetch_artifact(&artifact_ref).await {
            Ok(bytes) => {
                tracing::info!(
                    prompt_id = %prompt_id,
                    filename = %artifact_ref.filename,
                    size = bytes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job completed",
                );
                JobOutcome::Success {
                    prompt_id,
                    artifact: Artifact {
                        reference: artifact_ref,
                        bytes,
                    },
                }
            }
            Err(e) => {
                tracing::error!(prompt_id = %prompt_id, error = %e, "Failed to fetch job output");
                JobOutcome::failed(FailureKind::Transport, e.to_string())
            }
        }
    }

    async fn poll_until_terminal(&self, prompt_id: &str) -> PollEnd {
        let mut not_found = 0u32;

        loop {
            match self.runtime.poll_status(prompt_id).await {
                Ok(JobStatus::NotFound) => {
                    not_found += 1;
                    tracing::debug!(prompt_id = %prompt_id, not_found, "Job still pending");
                    if let Some(limit) = self.config.max_consecutive_not_found {
                        if not_found > limit {
                            return PollEnd::Failed(vec![format!(
                                "prompt {prompt_id} missing from history after {not_found} polls"
                            )]);
                        }
                    }
                }
                Ok(JobStatus::Failed { messages }) => return PollEnd::Failed(messages),
                Ok(JobStatus::Finished { outputs }) => {
                    return match select_artifact(&outputs, SAVE_IMAGE_NODE) {
                        Some(artifact) => PollEnd::Done(artifact.clone()),
                        None => PollEnd::Failed(vec![format!(
                            "job finished without an image from node {SAVE_IMAGE_NODE}"
                        )]),
                    };
                }
                Err(e) => {
                    not_found = 0;
                    tracing::warn!(prompt_id = %prompt_id, error = %e, "Error checking history");
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}
