#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use viewshift_api::config::ServerConfig;
use viewshift_api::router::build_app_router;
use viewshift_api::state::AppState;
use viewshift_comfyui::api::ComfyUIApiError;
use viewshift_comfyui::history::{ArtifactRef, JobStatus, NodeOutput};
use viewshift_comfyui::runtime::EngineRuntime;
use viewshift_comfyui::workflow::{JobGraph, POSITIVE_PROMPT_NODE, SAVE_IMAGE_NODE};

/// Build a test `ServerConfig` with safe defaults and a short job budget.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["*".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 1024 * 1024,
        comfyui_url: "http://127.0.0.1:8188".to_string(),
        job_timeout_secs: 2,
        poll_interval_ms: 10,
        max_consecutive_not_found: None,
        output_prefix: "qwen".to_string(),
    }
}

/// Build the full application router around `engine`, with the same
/// middleware stack production uses.
pub fn build_test_app(engine: Arc<FakeEngine>) -> Router {
    build_test_app_with(engine, test_config())
}

/// Same as [`build_test_app`] with a caller-supplied configuration.
pub fn build_test_app_with(engine: Arc<FakeEngine>, config: ServerConfig) -> Router {
    let state = AppState::new(config.clone(), engine);
    build_app_router(state, &config)
}

pub async fn send(app: Router, request: Request<Body>) -> Response<Body> {
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// PNG signature and header, zero-padded past the minimum size check.
pub fn png_base64() -> String {
    use viewshift_core::source_image::encode_base64;

    let mut bytes = vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
        0x15, 0xC4, 0x89,
    ];
    bytes.extend(std::iter::repeat(0u8).take(128));
    encode_base64(&bytes)
}

// ---------------------------------------------------------------------------
// Fake engine
// ---------------------------------------------------------------------------

/// How the fake engine treats a job whose prompt matches.
#[derive(Clone)]
pub enum Behaviour {
    Fail(&'static str),
    Reject(&'static str),
    Hang,
}

/// In-memory ComfyUI: every job finishes on its first poll unless its prompt
/// has a scripted [`Behaviour`].
#[derive(Default)]
pub struct FakeEngine {
    unhealthy: bool,
    upload_fails: bool,
    behaviours: Mutex<BTreeMap<String, Behaviour>>,
    submitted: Mutex<Vec<JobGraph>>,
    uploads: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Engine whose health probe always fails.
    pub fn unhealthy() -> Self {
        Self {
            unhealthy: true,
            ..Default::default()
        }
    }

    /// Healthy engine that refuses every upload.
    pub fn failing_upload() -> Self {
        Self {
            upload_fails: true,
            ..Default::default()
        }
    }

    pub fn with(self, prompt: &str, behaviour: Behaviour) -> Self {
        self.behaviours
            .lock()
            .unwrap()
            .insert(prompt.to_string(), behaviour);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|g| literal(g, POSITIVE_PROMPT_NODE, "text"))
            .collect()
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    fn behaviour(&self, graph: &JobGraph) -> Option<Behaviour> {
        let prompt = literal(graph, POSITIVE_PROMPT_NODE, "text");
        self.behaviours.lock().unwrap().get(&prompt).cloned()
    }
}

fn literal(graph: &JobGraph, node: &str, input: &str) -> String {
    graph
        .literal(node, input)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

#[async_trait]
impl EngineRuntime for FakeEngine {
    async fn submit(&self, graph: &JobGraph, _client_id: &str) -> Result<String, ComfyUIApiError> {
        if let Some(Behaviour::Reject(body)) = self.behaviour(graph) {
            return Err(ComfyUIApiError::ApiError {
                status: 400,
                body: body.to_string(),
            });
        }
        let mut submitted = self.submitted.lock().unwrap();
        submitted.push(graph.clone());
        Ok((submitted.len() - 1).to_string())
    }

    async fn poll_status(&self, prompt_id: &str) -> Result<JobStatus, ComfyUIApiError> {
        let index: usize = prompt_id.parse().unwrap();
        let graph = self.submitted.lock().unwrap()[index].clone();

        match self.behaviour(&graph) {
            Some(Behaviour::Hang) => Ok(JobStatus::NotFound),
            Some(Behaviour::Fail(message)) => Ok(JobStatus::Failed {
                messages: vec![message.to_string()],
            }),
            _ => {
                let prefix = literal(&graph, SAVE_IMAGE_NODE, "filename_prefix");
                let output = NodeOutput {
                    images: vec![ArtifactRef {
                        filename: format!("{prefix}_00001_.png"),
                        subfolder: String::new(),
                        kind: "output".to_string(),
                    }],
                };
                Ok(JobStatus::Finished {
                    outputs: BTreeMap::from([(SAVE_IMAGE_NODE.to_string(), output)]),
                })
            }
        }
    }

    async fn fetch_artifact(&self, artifact: &ArtifactRef) -> Result<Vec<u8>, ComfyUIApiError> {
        Ok(artifact.filename.as_bytes().to_vec())
    }

    async fn upload_image(&self, _bytes: Vec<u8>, filename: &str) -> Result<String, ComfyUIApiError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.upload_fails {
            return Err(ComfyUIApiError::ApiError {
                status: 500,
                body: "disk full".to_string(),
            });
        }
        Ok(filename.to_string())
    }

    async fn cancel(&self, _prompt_id: &str) -> Result<(), ComfyUIApiError> {
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        !self.unhealthy
    }
}
