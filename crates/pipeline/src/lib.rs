//! Multi-perspective batch generation.
//!
//! [`batch::BatchCoordinator`] turns one source image and an ordered list
//! of perspectives into one job per perspective, runs them one at a time
//! through the ComfyUI orchestrator, and either returns every image or a
//! single [`error::BatchError`].

pub mod batch;
pub mod error;
