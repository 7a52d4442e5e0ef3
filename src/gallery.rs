//! Request-handling core: upload orchestration and the read paths.
//!
//! Holds no state of its own. The object store is read fresh on every call.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, warn};

use crate::describe::DescriptionGenerator;
use crate::error::StorageError;
use crate::storage::{description_key, ObjectStore};

pub const UNTITLED: &str = "Untitled";
pub const NO_DESCRIPTION: &str = "No description available.";

/// What happened to an upload. Only used for logging and tests; the HTTP
/// layer redirects regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No file name was supplied, nothing was stored.
    Skipped,
    /// The image was stored; `described` says whether a description was too.
    Stored { described: bool },
    /// The image could not be staged or stored.
    Failed,
}

/// Data for the detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageView {
    pub title: String,
    pub description: String,
    pub image_url: String,
}

/// A description object as read back for display.
///
/// Both fields are required; anything else in the object is ignored.
#[derive(Debug, Deserialize)]
struct StoredDescription {
    title: String,
    description: String,
}

#[derive(Clone)]
pub struct GalleryService {
    store: Arc<dyn ObjectStore>,
    generator: DescriptionGenerator,
    scratch_dir: PathBuf,
}

impl GalleryService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        generator: DescriptionGenerator,
        scratch_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            generator,
            scratch_dir: scratch_dir.into(),
        }
    }

    /// Store an uploaded image under `filename` and try to describe it.
    ///
    /// The name is the storage key, verbatim; an existing object of the same
    /// name is overwritten. The scratch copy handed to the generator is
    /// removed on every path out of this function.
    pub async fn upload(&self, filename: &str, data: Vec<u8>, mime_type: &str) -> UploadOutcome {
        if filename.is_empty() {
            return UploadOutcome::Skipped;
        }

        let scratch = match self.stage(&data).await {
            Ok(file) => file,
            Err(e) => {
                warn!(key = %filename, error = %e, "could not write scratch file");
                return UploadOutcome::Failed;
            }
        };

        if let Err(e) = self.store.put(filename, data, mime_type).await {
            warn!(key = %filename, error = %e, "image upload failed");
            return UploadOutcome::Failed;
        }
        info!(key = %filename, mime_type = %mime_type, "stored image");

        let description = self.generator.generate(scratch.path(), mime_type).await;
        if let Err(e) = scratch.close() {
            warn!(error = %e, "could not remove scratch file");
        }

        let Some(description) = description else {
            return UploadOutcome::Stored { described: false };
        };

        let key = description_key(filename);
        match self
            .store
            .put(&key, description.into_bytes(), "application/json")
            .await
        {
            Ok(()) => {
                info!(key = %key, "saved description");
                UploadOutcome::Stored { described: true }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "saving description failed");
                UploadOutcome::Stored { described: false }
            }
        }
    }

    async fn stage(&self, data: &[u8]) -> std::io::Result<tempfile::NamedTempFile> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.scratch_dir)?;
        tokio::fs::write(file.path(), data).await?;
        Ok(file)
    }

    /// Every key in the bucket, description objects included.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        self.store.list().await
    }

    /// Title, description and image URL for the detail page.
    ///
    /// Missing or malformed descriptions fall back to placeholders. A missing
    /// image is an error.
    pub async fn view(&self, filename: &str) -> Result<ImageView, StorageError> {
        let description = self.load_description(filename).await?;

        if !self.store.exists(filename).await? {
            return Err(StorageError::NotFound(filename.to_string()));
        }

        Ok(ImageView {
            title: description.title,
            description: description.description,
            image_url: format!("/images/{}", urlencoding::encode(filename)),
        })
    }

    async fn load_description(&self, filename: &str) -> Result<StoredDescription, StorageError> {
        let key = description_key(filename);
        if !self.store.exists(&key).await? {
            return Ok(placeholder());
        }

        let text = match self.store.get_text(&key).await {
            Ok(text) => text,
            Err(StorageError::NotText { .. }) => return Ok(placeholder()),
            Err(e) => return Err(e),
        };

        Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(key = %key, error = %e, "stored description is malformed");
            placeholder()
        }))
    }

    /// Raw image bytes.
    pub async fn image(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        self.store.get(filename).await
    }
}

fn placeholder() -> StoredDescription {
    StoredDescription {
        title: UNTITLED.to_string(),
        description: NO_DESCRIPTION.to_string(),
    }
}
