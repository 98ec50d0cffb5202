use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use viewshift_api::config::ServerConfig;
use viewshift_api::router::build_app_router;
use viewshift_api::state::AppState;
use viewshift_comfyui::api::ComfyUIApi;
use viewshift_comfyui::health::{wait_until_ready, ReadinessConfig};
use viewshift_comfyui::runtime::EngineRuntime;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "viewshift_api=debug,viewshift_comfyui=debug,viewshift_pipeline=debug,tower_http=debug"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        comfyui_url = %config.comfyui_url,
        job_timeout_secs = config.job_timeout_secs,
        "Loaded server configuration",
    );

    // --- ComfyUI ---
    let runtime: Arc<dyn EngineRuntime> = Arc::new(ComfyUIApi::new(config.comfyui_url.clone()));

    // Wait for ComfyUI in the background so /health answers during startup.
    let readiness_cancel = CancellationToken::new();
    let readiness_handle = {
        let runtime = Arc::clone(&runtime);
        let cancel = readiness_cancel.clone();
        tokio::spawn(async move {
            wait_until_ready(runtime.as_ref(), &ReadinessConfig::default(), &cancel).await
        })
    };

    // --- App state + router ---
    let state = AppState::new(config.clone(), runtime);
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    readiness_cancel.cancel();
    let _ = readiness_handle.await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
