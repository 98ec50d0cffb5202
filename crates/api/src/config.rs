use std::time::Duration;

use viewshift_comfyui::orchestrator::PollConfig;
use viewshift_core::generation::DEFAULT_OUTPUT_PREFIX;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to a local ComfyUI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    /// A single `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds. Must cover a whole batch.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
    /// Base HTTP URL of the ComfyUI instance.
    pub comfyui_url: String,
    /// Per-job polling budget in seconds.
    pub job_timeout_secs: u64,
    /// Delay between history polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Fail a job after this many consecutive "not found" polls.
    pub max_consecutive_not_found: Option<u32>,
    /// Prefix for artifact filenames written by the save node.
    pub output_prefix: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                  |
    /// |-----------------------------|--------------------------|
    /// | `HOST`                      | `0.0.0.0`                |
    /// | `PORT`                      | `8000`                   |
    /// | `CORS_ORIGINS`              | `*`                      |
    /// | `REQUEST_TIMEOUT_SECS`      | `900`                    |
    /// | `MAX_BODY_BYTES`            | `33554432`               |
    /// | `COMFYUI_URL`               | `http://127.0.0.1:8188`  |
    /// | `JOB_TIMEOUT_SECS`          | `120`                    |
    /// | `POLL_INTERVAL_MS`          | `1000`                   |
    /// | `MAX_CONSECUTIVE_NOT_FOUND` | unset                    |
    /// | `OUTPUT_PREFIX`             | `qwen`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "900".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let max_body_bytes: usize = std::env::var("MAX_BODY_BYTES")
            .unwrap_or_else(|_| (32 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_BODY_BYTES must be a valid usize");

        let comfyui_url =
            std::env::var("COMFYUI_URL").unwrap_or_else(|_| "http://127.0.0.1:8188".into());

        let job_timeout_secs: u64 = std::env::var("JOB_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("JOB_TIMEOUT_SECS must be a valid u64");

        let poll_interval_ms: u64 = std::env::var("POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("POLL_INTERVAL_MS must be a valid u64");

        let max_consecutive_not_found: Option<u32> = std::env::var("MAX_CONSECUTIVE_NOT_FOUND")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(|s| {
                s.trim()
                    .parse()
                    .expect("MAX_CONSECUTIVE_NOT_FOUND must be a valid u32")
            });

        let output_prefix =
            std::env::var("OUTPUT_PREFIX").unwrap_or_else(|_| DEFAULT_OUTPUT_PREFIX.into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_body_bytes,
            comfyui_url,
            job_timeout_secs,
            poll_interval_ms,
            max_consecutive_not_found,
            output_prefix,
        }
    }

    /// Poll schedule handed to the job orchestrator.
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.job_timeout_secs),
            max_consecutive_not_found: self.max_consecutive_not_found,
        }
    }

    /// Whether any origin may call the API.
    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}
