//! Decoding and sniffing of the base64 source image carried by a request.
//!
//! Only the container format is detected (from the magic bytes); pixel data
//! is never decoded here.

use base64::{engine::general_purpose, Engine};
pub use image::ImageFormat;

use crate::error::CoreError;

/// Anything shorter than this cannot be a real image.
pub const MIN_IMAGE_BYTES: usize = 100;

/// Container formats the engine's load node accepts.
const ACCEPTED_FORMATS: &[ImageFormat] = &[ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// A decoded source image.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl SourceImage {
    /// File extension for the sniffed format (`png`, `jpg`, `webp`).
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("png")
    }
}

/// Decode a standard-alphabet base64 image, tolerating a leading
/// `data:<mime>;base64,` prefix and line-wrapped (MIME-style) payloads.
pub fn decode_source_image(encoded: &str) -> Result<SourceImage, CoreError> {
    let payload = strip_data_url_prefix(encoded.trim());
    if payload.is_empty() {
        return Err(CoreError::Validation("image is required".to_string()));
    }

    let payload: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| CoreError::InvalidImage(format!("invalid base64 image data: {e}")))?;

    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(CoreError::InvalidImage(format!(
            "image data too small ({} bytes)",
            bytes.len()
        )));
    }

    let format = image::guess_format(&bytes)
        .ok()
        .filter(|f| ACCEPTED_FORMATS.contains(f))
        .ok_or_else(|| {
            CoreError::InvalidImage("image must be a PNG, JPEG or WebP file".to_string())
        })?;

    Ok(SourceImage { bytes, format })
}

/// Encode bytes as standard-alphabet base64.
pub fn encode_base64(bytes: &[u8]) -> String {
    general_purpose::STANDARD.encode(bytes)
}

fn strip_data_url_prefix(s: &str) -> &str {
    if s.starts_with("data:") {
        if let Some(idx) = s.find(";base64,") {
            return &s[idx + ";base64,".len()..];
        }
    }
    s
}
