use viewshift_comfyui::api::names_missing_model;
use viewshift_comfyui::orchestrator::FailureKind;
use viewshift_comfyui::workflow::WorkflowError;
use viewshift_core::error::{CoreError, ErrorCode};

/// How a single perspective's job ended when it did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum PerspectiveFailure {
    Failed {
        kind: FailureKind,
        messages: Vec<String>,
    },
    TimedOut {
        timeout_secs: u64,
    },
}

/// Errors that abort a batch. A batch never returns partial results.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    /// The request failed validation before anything was submitted.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// The engine is down or refused the source image.
    #[error("{0}")]
    ServiceUnavailable(String),

    /// The job for one perspective failed or timed out; later perspectives
    /// were not attempted.
    #[error("{}", perspective_message(.name, .failure))]
    Perspective {
        id: String,
        name: String,
        failure: PerspectiveFailure,
    },
}

impl From<WorkflowError> for BatchError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::MalformedTemplate(msg) => BatchError::MalformedTemplate(msg),
            WorkflowError::Parameter(core) => BatchError::Core(core),
        }
    }
}

impl BatchError {
    /// Wire classification of this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            BatchError::Core(core) => core.code(),
            BatchError::MalformedTemplate(_) => ErrorCode::ServerError,
            BatchError::ServiceUnavailable(_) => ErrorCode::ServiceUnavailable,
            BatchError::Perspective { failure, .. } => match failure {
                PerspectiveFailure::TimedOut { .. } => ErrorCode::Timeout,
                PerspectiveFailure::Failed {
                    kind: FailureKind::SubmissionRejected,
                    messages,
                } if messages.iter().any(|m| names_missing_model(m)) => ErrorCode::ModelError,
                PerspectiveFailure::Failed { .. } => ErrorCode::GenerationError,
            },
        }
    }

    /// Engine-provided text to pass through as `details`, if any.
    pub fn details(&self) -> Option<String> {
        match self {
            BatchError::Perspective {
                failure: PerspectiveFailure::Failed { messages, .. },
                ..
            } if !messages.is_empty() => Some(messages.join("; ")),
            _ => None,
        }
    }
}

fn perspective_message(name: &str, failure: &PerspectiveFailure) -> String {
    match failure {
        PerspectiveFailure::TimedOut { timeout_secs } => {
            format!("Generation for perspective '{name}' timed out after {timeout_secs} seconds")
        }
        PerspectiveFailure::Failed { kind, .. } => match kind {
            FailureKind::SubmissionRejected => {
                format!("ComfyUI rejected the job for perspective '{name}'")
            }
            FailureKind::GenerationFailed => format!("Generation failed for perspective '{name}'"),
            FailureKind::Transport => {
                format!("Lost contact with ComfyUI while generating perspective '{name}'")
            }
        },
    }
}
