use std::sync::Arc;

use ai_image_gallery::config::{Config, StorageBackendKind};
use ai_image_gallery::describe::{DescriptionGenerator, GeminiClient};
use ai_image_gallery::server::{self, create_router_with_limit, AppState};
use ai_image_gallery::storage::{FilesystemStore, GcsStore, ObjectStore};
use ai_image_gallery::GalleryService;
use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

fn build_store(config: &Config) -> Arc<dyn ObjectStore> {
    match &config.storage {
        StorageBackendKind::Gcs => {
            let mut store = GcsStore::new(config.bucket.clone());
            if let Some(token) = &config.gcs_access_token {
                store = store.with_access_token(token.clone());
            }
            if let Some(endpoint) = &config.gcs_endpoint {
                store = store.with_base_url(endpoint.clone());
            }
            tracing::info!("Using GCS bucket {}", store.bucket());
            Arc::new(store)
        }
        StorageBackendKind::Local { root } => {
            tracing::info!("Using local storage at {}", root.display());
            Arc::new(FilesystemStore::new(root.clone()))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("ai_image_gallery=debug,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = Config::from_env().context("invalid configuration")?;

    let store = build_store(&config);
    let model = GeminiClient::new(config.gemini_api_key.clone(), config.gemini_model.clone());
    let generator = DescriptionGenerator::new(Arc::new(model));
    let gallery = GalleryService::new(store, generator, config.scratch_dir.clone());

    let app = create_router_with_limit(AppState::new(gallery), config.max_upload_bytes);

    server::serve(app, &config.bind_addr).await
}
