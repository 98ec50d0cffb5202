//! Perspectives: named camera-angle prompts applied to one source image.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// One requested view of the source image.
///
/// Identity is `id`; duplicates are allowed and processed independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perspective {
    pub id: String,
    /// Display name, used in error messages.
    pub name: String,
    /// Prompt text sent to the positive conditioning node.
    pub prompt: String,
}

impl Perspective {
    pub fn new(id: impl Into<String>, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}

/// Validate a batch of perspectives before anything is submitted.
///
/// - The list must not be empty.
/// - Every perspective must carry a non-empty prompt; the error names the
///   first offending index.
pub fn validate_perspectives(perspectives: &[Perspective]) -> Result<(), CoreError> {
    if perspectives.is_empty() {
        return Err(CoreError::Validation(
            "at least one perspective is required".to_string(),
        ));
    }
    if let Some(index) = perspectives.iter().position(|p| p.prompt.is_empty()) {
        return Err(CoreError::Validation(format!(
            "perspectives[{index}].prompt is required"
        )));
    }
    Ok(())
}

/// Make a perspective id safe to embed in an artifact filename prefix.
///
/// Characters outside `[A-Za-z0-9_-]` become `_`.
pub fn filename_safe_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
