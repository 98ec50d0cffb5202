use std::sync::Arc;

use viewshift_comfyui::runtime::EngineRuntime;
use viewshift_pipeline::batch::BatchCoordinator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc` or is already `Clone`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// The ComfyUI engine (the HTTP client in production).
    pub runtime: Arc<dyn EngineRuntime>,
    /// Batch coordinator bound to `runtime`.
    pub coordinator: BatchCoordinator,
}

impl AppState {
    pub fn new(config: ServerConfig, runtime: Arc<dyn EngineRuntime>) -> Self {
        let coordinator = BatchCoordinator::new(Arc::clone(&runtime), config.poll_config());
        Self {
            config: Arc::new(config),
            runtime,
            coordinator,
        }
    }
}
