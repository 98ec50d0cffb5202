//! Readiness wait for a ComfyUI instance.
//!
//! ComfyUI takes a while to load its models after the process starts.
//! [`wait_until_ready`] probes the engine at a fixed interval until it
//! answers, the attempt budget runs out, or the [`CancellationToken`]
//! is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::runtime::EngineRuntime;

/// Probe schedule used while waiting for the engine to come up.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Delay between failed probes.
    pub interval: Duration,
    /// Number of probes before giving up.
    pub max_attempts: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

/// Wait until `runtime` reports healthy.
///
/// Returns `true` as soon as a probe succeeds, `false` when every attempt
/// failed or `cancel` fired first.
pub async fn wait_until_ready(
    runtime: &dyn EngineRuntime,
    config: &ReadinessConfig,
    cancel: &CancellationToken,
) -> bool {
    for attempt in 1..=config.max_attempts {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Readiness wait cancelled");
                return false;
            }
            healthy = runtime.is_healthy() => {
                if healthy {
                    tracing::info!(attempt, "ComfyUI is ready");
                    return true;
                }
                tracing::debug!(
                    attempt,
                    max_attempts = config.max_attempts,
                    "ComfyUI not ready yet",
                );
            }
        }

        if attempt == config.max_attempts {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(config.interval) => {}
        }
    }

    tracing::warn!(
        max_attempts = config.max_attempts,
        "ComfyUI did not become ready",
    );
    false
}
