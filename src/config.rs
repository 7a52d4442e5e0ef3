//! Environment-sourced configuration.
//!
//! The bucket name and the generative API credential are mandatory; the
//! process refuses to start without them. Everything else has a default.

use std::path::PathBuf;

use crate::error::ConfigError;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Which object store backend to talk to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackendKind {
    /// Google Cloud Storage bucket named by `bucket`.
    Gcs,
    /// Flat directory on local disk, for development.
    Local { root: PathBuf },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub bind_addr: String,
    pub scratch_dir: PathBuf,
    pub storage: StorageBackendKind,
    /// Static bearer token for GCS. When unset, tokens come from the metadata server.
    pub gcs_access_token: Option<String>,
    /// Overrides the GCS API base URL (emulators).
    pub gcs_endpoint: Option<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = get("GCS_BUCKET_NAME").ok_or(ConfigError::Missing("GCS_BUCKET_NAME"))?;
        let gemini_api_key = get("GEMINI_API")
            .or_else(|| get("GEMINI_API_KEY"))
            .ok_or(ConfigError::Missing("GEMINI_API"))?;

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                name: "PORT",
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };
        let bind_addr = get("BIND_ADDR").unwrap_or_else(|| format!("0.0.0.0:{}", port));

        let storage = match get("STORAGE_BACKEND").as_deref().map(str::trim) {
            None | Some("gcs") => StorageBackendKind::Gcs,
            Some("local") => StorageBackendKind::Local {
                root: get("LOCAL_STORAGE_DIR")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing("LOCAL_STORAGE_DIR"))?,
            },
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND",
                    reason: format!("unknown backend '{}', expected 'gcs' or 'local'", other),
                })
            }
        };

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
                name: "MAX_UPLOAD_BYTES",
                reason: e.to_string(),
            })?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        Ok(Self {
            bucket,
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            bind_addr,
            scratch_dir: get("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(std::env::temp_dir),
            storage,
            gcs_access_token: get("GCS_ACCESS_TOKEN"),
            gcs_endpoint: get("STORAGE_EMULATOR_HOST"),
            max_upload_bytes,
        })
    }
}
