//! ComfyUI job orchestration library.
//!
//! Builds the multi-view job graph from a fixed template, injects
//! per-job parameters, wraps the ComfyUI HTTP API behind the
//! [`runtime::EngineRuntime`] trait, and drives a single job from
//! submission to a terminal [`orchestrator::JobOutcome`].

pub mod api;
pub mod health;
pub mod history;
pub mod orchestrator;
pub mod runtime;
pub mod workflow;

#[cfg(test)]
mod fake;
