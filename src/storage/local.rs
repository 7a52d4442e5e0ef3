//! Local directory backend.
//!
//! Each key becomes a file under the root directory. Keys are joined to the
//! root as-is, so a key containing `/` lands in a subdirectory and is listed
//! back with forward slashes.
//!
//! Writes are staged in a sibling `<root>.staging` directory and renamed into
//! place, so every file under the root is a complete object.

use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{ObjectStore, Result};
use crate::error::StorageError;

pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn staging_dir(&self) -> PathBuf {
        // components() drops a trailing separator, keeping staging outside the root
        let mut name = self.root.components().as_path().as_os_str().to_os_string();
        name.push(".staging");
        PathBuf::from(name)
    }
}

#[async_trait]
impl ObjectStore for FilesystemStore {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> Result<()> {
        let full_path = self.full_path(key);
        debug!(key = %key, path = %full_path.display(), size = data.len(), "local store: put");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Each write gets its own temp file, so concurrent writers to one key
        // never share a file; the last rename wins.
        let staging = self.staging_dir();
        let target = full_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            std::fs::create_dir_all(&staging)?;
            let mut file = tempfile::NamedTempFile::new_in(&staging)?;
            file.write_all(&data)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
        .map_err(|e| {
            warn!(key = %key, path = %full_path.display(), error = %e, "local store: write failed");
            StorageError::Io(e)
        })
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        match fs::read(self.full_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.full_path(key);
        Ok(fs::try_exists(&path).await? && fs::metadata(&path).await?.is_file())
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.full_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
