//! Google Cloud Storage backend using the JSON API.
//!
//! Authentication is a bearer token: either a static one from configuration
//! or one from the GCE/Cloud Run metadata server, cached until shortly
//! before it expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{ObjectStore, Result};
use crate::error::StorageError;

const GCS_BASE_URL: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
/// Refresh this long before the metadata server's stated expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn new(value: String, expires_in: Duration, now: Instant) -> Self {
        Self {
            value,
            expires_at: now + expires_in.saturating_sub(TOKEN_REFRESH_MARGIN),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectResource>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
}

pub struct GcsStore {
    client: reqwest::Client,
    bucket: String,
    base_url: String,
    access_token: Option<String>,
    cached_token: Mutex<Option<CachedToken>>,
}

impl GcsStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bucket: bucket.into(),
            base_url: GCS_BASE_URL.to_string(),
            access_token: None,
            cached_token: Mutex::new(None),
        }
    }

    /// Use a fixed bearer token instead of asking the metadata server.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Point at a different API host, e.g. a local emulator.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn objects_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.objects_url(), urlencoding::encode(key))
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o",
            self.base_url,
            urlencoding::encode(&self.bucket)
        )
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }

        // Held across the fetch so concurrent callers share one refresh.
        let mut cached = self.cached_token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| StorageError::Auth(format!("metadata server unreachable: {}", e)))?;

        if !response.status().is_success() {
            return Err(StorageError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("bad token response: {}", e)))?;
        debug!(expires_in = token.expires_in, "gcs: fetched access token");

        let fresh = CachedToken::new(
            token.access_token,
            Duration::from_secs(token.expires_in),
            Instant::now(),
        );
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn fail(key: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return StorageError::NotFound(key.to_string());
        }
        let body = response.text().await.unwrap_or_default();
        warn!(key = %key, status = %status, "gcs request failed");
        StorageError::Http {
            status: status.as_u16(),
            body,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        debug!(bucket = %self.bucket, key = %key, size = data.len(), "gcs: upload");
        let response = self
            .client
            .post(self.upload_url())
            .bearer_auth(self.token().await?)
            .query(&[("uploadType", "media"), ("name", key)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(key, response).await);
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(self.token().await?)
            .query(&[("alt", "media")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(key, response).await);
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let response = self
            .client
            .get(self.object_url(key))
            .bearer_auth(self.token().await?)
            .query(&[("fields", "name")])
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(true);
        }
        match Self::fail(key, response).await {
            StorageError::NotFound(_) => Ok(false),
            other => Err(other),
        }
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(self.objects_url())
                .bearer_auth(self.token().await?)
                .query(&[("fields", "items(name),nextPageToken")]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(Self::fail(&self.bucket, response).await);
            }

            let page: ListResponse = response.json().await?;
            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!(bucket = %self.bucket, count = names.len(), "gcs: listed objects");
        Ok(names)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(self.token().await?)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(());
        }
        match Self::fail(key, response).await {
            StorageError::NotFound(_) => Ok(()),
            other => Err(other),
        }
    }
}
