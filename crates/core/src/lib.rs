//! Domain types and validation shared by the viewshift crates.

pub mod error;
pub mod generation;
pub mod perspective;
pub mod source_image;
