//! Object storage abstraction.
//!
//! The gallery keeps everything in a flat namespace of named blobs: images
//! under their upload name and descriptions under `<name>.json`. Backends
//! implement [`ObjectStore`]; the rest of the crate never sees which one is
//! in use.

use async_trait::async_trait;

use crate::error::StorageError;

pub mod gcs;
pub mod local;
pub mod memory;

pub use gcs::GcsStore;
pub use local::FilesystemStore;
pub use memory::MemoryStore;

pub type Result<T> = std::result::Result<T, StorageError>;

/// A flat key/blob store.
///
/// Keys are used verbatim. Writes overwrite unconditionally.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;

    /// Fetch the object's bytes. Missing keys yield [`StorageError::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Whether an object named `key` exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Every key in the store, unfiltered.
    async fn list(&self) -> Result<Vec<String>>;

    /// Remove the object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Fetch the object and decode it as UTF-8.
    async fn get_text(&self, key: &str) -> Result<String> {
        let bytes = self.get(key).await?;
        String::from_utf8(bytes).map_err(|_| StorageError::NotText {
            key: key.to_string(),
        })
    }
}

/// Key of the description object that belongs to `image_key`.
pub fn description_key(image_key: &str) -> String {
    format!("{}.json", image_key)
}
