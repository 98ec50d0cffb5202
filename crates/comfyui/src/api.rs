//! REST API client for the ComfyUI HTTP endpoints.
//!
//! Wraps the ComfyUI HTTP API (workflow submission, cancellation,
//! history retrieval, artifact download, image upload, health probe)
//! using [`reqwest`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::history::{parse_history, ArtifactRef, JobStatus};
use crate::runtime::EngineRuntime;
use crate::workflow::JobGraph;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
const HISTORY_TIMEOUT: Duration = Duration::from_secs(5);
const VIEW_TIMEOUT: Duration = Duration::from_secs(30);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for a single ComfyUI instance.
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the ComfyUI `/prompt` endpoint.
///
/// A rejected workflow comes back with `error` (and usually
/// `node_errors`) set instead of a `prompt_id`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned identifier for the queued prompt.
    #[serde(default)]
    pub prompt_id: String,
    /// Position in the execution queue.
    #[serde(default)]
    pub number: i64,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub node_errors: Option<Value>,
}

/// Response returned by `/upload/image`.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    #[serde(default)]
    pub subfolder: String,
}

impl UploadResponse {
    /// Reference accepted by a `LoadImage` node (`subfolder/name` or `name`).
    pub fn image_ref(&self) -> String {
        if self.subfolder.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.subfolder, self.name)
        }
    }
}

/// Errors from the ComfyUI REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// The HTTP request itself failed (network, DNS, timeout, body decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// ComfyUI returned a non-2xx status code.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// ComfyUI accepted the request but refused the workflow.
    #[error("ComfyUI rejected workflow: {0}")]
    Rejected(String),

    /// A 2xx response whose body did not have the expected shape.
    #[error("Unexpected ComfyUI response: {0}")]
    InvalidResponse(String),
}

impl ComfyUIApiError {
    /// Whether the engine refused the request (as opposed to being unreachable).
    pub fn is_rejection(&self) -> bool {
        match self {
            ComfyUIApiError::Rejected(_) => true,
            ComfyUIApiError::ApiError { status, .. } => (400..500).contains(status),
            _ => false,
        }
    }

    /// Whether the rejection names a model file the engine could not find.
    pub fn mentions_missing_model(&self) -> bool {
        names_missing_model(&self.to_string())
    }
}

/// Whether engine error text reports a model file that is not installed.
///
/// ComfyUI reports unknown loader values as `value_not_in_list` with the
/// requested `.safetensors` filename in the details.
pub fn names_missing_model(text: &str) -> bool {
    text.contains("value_not_in_list") && text.contains(".safetensors")
}

impl ComfyUIApi {
    /// Create a new API client for a ComfyUI instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        let api_url = api_url.trim_end_matches('/').to_string();
        Self { client, api_url }
    }

    /// HTTP API base URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit a workflow for execution.
    ///
    /// Sends a `POST /prompt` request with the given workflow JSON and
    /// client ID. Returns the server-assigned `prompt_id` and queue
    /// position.
    pub async fn submit_workflow(
        &self,
        workflow: &JobGraph,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({
            "prompt": workflow,
            "client_id": client_id,
        });

        let response = self
            .client
            .post(format!("{}/prompt", self.api_url))
            .timeout(SUBMIT_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        let submitted: SubmitResponse = Self::parse_response(response).await?;

        if let Some(error) = submitted.error.as_ref().filter(|e| !e.is_null()) {
            let details = match &submitted.node_errors {
                Some(nodes) if !nodes.is_null() => format!("{error} node_errors={nodes}"),
                _ => error.to_string(),
            };
            return Err(ComfyUIApiError::Rejected(details));
        }
        if submitted.prompt_id.is_empty() {
            return Err(ComfyUIApiError::InvalidResponse(
                "submission response has no prompt_id".to_string(),
            ));
        }
        Ok(submitted)
    }

    /// Cancel a queued or running execution.
    ///
    /// Sends a `POST /queue` request asking ComfyUI to delete the
    /// specified prompt from the queue.
    pub async fn cancel_execution(&self, prompt_id: &str) -> Result<(), ComfyUIApiError> {
        let body = serde_json::json!({
            "delete": [prompt_id],
        });

        let response = self
            .client
            .post(format!("{}/queue", self.api_url))
            .timeout(HISTORY_TIMEOUT)
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Retrieve execution history for a specific prompt.
    ///
    /// Sends a `GET /history/{prompt_id}` request. A 404 or an empty object
    /// both mean the prompt has not finished yet.
    pub async fn get_history(&self, prompt_id: &str) -> Result<JobStatus, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/history/{}", self.api_url, prompt_id))
            .timeout(HISTORY_TIMEOUT)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(JobStatus::NotFound);
        }

        let body: Value = Self::parse_response(response).await?;
        parse_history(prompt_id, &body)
            .map_err(|e| ComfyUIApiError::InvalidResponse(format!("history payload: {e}")))
    }

    /// Download an output file via `GET /view`.
    pub async fn view(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/view", self.api_url))
            .query(&[
                ("filename", artifact.filename.as_str()),
                ("subfolder", artifact.subfolder.as_str()),
                ("type", artifact.kind.as_str()),
            ])
            .timeout(VIEW_TIMEOUT)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Upload an image into ComfyUI's input directory via
    /// `POST /upload/image`, overwriting any file with the same name.
    pub async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<UploadResponse, ComfyUIApiError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("type", "input")
            .text("overwrite", "true");

        let response = self
            .client
            .post(format!("{}/upload/image", self.api_url))
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Probe `GET /system_stats`.
    pub async fn system_stats(&self) -> Result<Value, ComfyUIApiError> {
        let response = self
            .client
            .get(format!("{}/system_stats", self.api_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`ComfyUIApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComfyUIApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ComfyUIApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ComfyUIApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl EngineRuntime for ComfyUIApi {
    async fn submit(&self, graph: &JobGraph, client_id: &str) -> Result<String, ComfyUIApiError> {
        let response = self.submit_workflow(graph, client_id).await?;
        tracing::debug!(
            prompt_id = %response.prompt_id,
            queue_position = response.number,
            "Workflow queued",
        );
        Ok(response.prompt_id)
    }

    async fn poll_status(&self, prompt_id: &str) -> Result<JobStatus, ComfyUIApiError> {
        self.get_history(prompt_id).await
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        self.view(artifact).await
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<String, ComfyUIApiError> {
        let uploaded = ComfyUIApi::upload_image(self, bytes, filename).await?;
        Ok(uploaded.image_ref())
    }

    async fn cancel(&self, prompt_id: &str) -> Result<(), ComfyUIApiError> {
        self.cancel_execution(prompt_id).await
    }

    async fn is_healthy(&self) -> bool {
        match self.system_stats().await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(api_url = %self.api_url, error = %e, "ComfyUI health probe failed");
                false
            }
        }
    }
}
