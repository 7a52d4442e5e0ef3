//! Image description generation.
//!
//! Sends the uploaded image with a fixed instruction to a vision model and
//! turns the free-form reply into a stored `{"title", "description"}` object.
//! The model is not schema-constrained, so replies are cleaned of markdown
//! fences and then validated strictly: exactly two string fields, nothing else.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::DescribeError;

pub mod gemini;

pub use gemini::GeminiClient;

/// Instruction sent alongside every image.
pub const DESCRIBE_PROMPT: &str = r#"Describe the image in detail. Provide a title and a description.
Format your response as a JSON object with the following structure:
{
  "title": "Generated Title",
  "description": "Generated Description"
}"#;

/// A vision-capable text generation API.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Send one image plus an instruction and return the reply text.
    async fn generate(
        &self,
        image: &[u8],
        mime_type: &str,
        prompt: &str,
    ) -> Result<String, DescribeError>;
}

/// Stored description of an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageDescription {
    pub title: String,
    pub description: String,
}

impl ImageDescription {
    /// Parse a model reply, fenced or not.
    pub fn from_reply(reply: &str) -> Result<Self, DescribeError> {
        Ok(serde_json::from_str(clean_reply(reply))?)
    }

    /// Serialise for storage: `title` then `description`, four-space indent.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Strip surrounding whitespace and a markdown code fence, if there is one.
///
/// Handles "```json ... ```", "``` ... ```" and unfenced text alike.
pub fn clean_reply(reply: &str) -> &str {
    let mut text = reply.trim();

    if let Some(rest) = text.strip_prefix("```") {
        text = match rest.get(..4) {
            Some(tag) if tag.eq_ignore_ascii_case("json") => &rest[4..],
            _ => rest,
        };
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    text.trim()
}

/// Pick a MIME type for an upload.
///
/// The declared type wins unless it is missing or generic, in which case the
/// bytes are sniffed.
pub fn resolve_mime_type(declared: Option<&str>, data: &[u8]) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => mime.to_string(),
        _ => sniff_mime_type(data).to_string(),
    }
}

fn sniff_mime_type(data: &[u8]) -> &'static str {
    use image::ImageFormat;

    match image::guess_format(data) {
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::Avif) => "image/avif",
        Ok(ImageFormat::Ico) => "image/x-icon",
        _ => "application/octet-stream",
    }
}

/// Wraps a [`VisionModel`] and turns its reply into a storable description.
#[derive(Clone)]
pub struct DescriptionGenerator {
    model: Arc<dyn VisionModel>,
}

impl DescriptionGenerator {
    pub fn new(model: Arc<dyn VisionModel>) -> Self {
        Self { model }
    }

    /// Describe the image at `image_path`.
    ///
    /// Returns the pretty-printed description JSON, or `None` on any failure.
    /// One attempt only; failures are logged, never returned.
    pub async fn generate(&self, image_path: &Path, mime_type: &str) -> Option<String> {
        match self.try_generate(image_path, mime_type).await {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(path = %image_path.display(), error = %e, "description generation failed");
                None
            }
        }
    }

    async fn try_generate(&self, image_path: &Path, mime_type: &str) -> Result<String, DescribeError> {
        let image = tokio::fs::read(image_path).await?;
        info!(mime_type = %mime_type, size = image.len(), "requesting image description");

        let reply = self.model.generate(&image, mime_type, DESCRIBE_PROMPT).await?;
        debug!(reply = %reply, "raw model reply");

        let description = ImageDescription::from_reply(&reply).map_err(|e| {
            warn!(reply = %reply, cleaned = %clean_reply(&reply), error = %e, "model reply is not a description object");
            e
        })?;

        Ok(description.to_pretty_json()?)
    }
}
