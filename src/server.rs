//! HTTP surface: router, handlers and the serve loop.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, Path, State},
    http::header,
    response::{Html, IntoResponse, Redirect},
    routing::get,
    Router,
};
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::DEFAULT_MAX_UPLOAD_BYTES;
use crate::describe::resolve_mime_type;
use crate::error::AppError;
use crate::gallery::GalleryService;
use crate::pages;

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "image";

#[derive(Clone)]
pub struct AppState {
    pub gallery: Arc<GalleryService>,
}

impl AppState {
    pub fn new(gallery: GalleryService) -> Self {
        Self {
            gallery: Arc::new(gallery),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    create_router_with_limit(state, DEFAULT_MAX_UPLOAD_BYTES)
}

pub fn create_router_with_limit(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(gallery_page).post(upload_image))
        .route("/view_image/:filename", get(view_image))
        .route("/images/:filename", get(serve_image))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn gallery_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let images = state.gallery.list().await?;
    Ok(Html(pages::gallery(&images)))
}

/// Accepts the `image` field and always redirects back to the gallery.
async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Redirect {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(e) => {
            warn!(error = %e, "upload is not a multipart form");
            return Redirect::to("/");
        }
    };

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "malformed upload");
                break;
            }
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let declared = field.content_type().map(str::to_string);
        let data = match field.bytes().await {
            Ok(data) => data.to_vec(),
            Err(e) => {
                warn!(key = %filename, error = %e, "could not read upload body");
                break;
            }
        };

        let mime_type = resolve_mime_type(declared.as_deref(), &data);
        let outcome = state.gallery.upload(&filename, data, &mime_type).await;
        info!(key = %filename, outcome = ?outcome, "upload handled");
        break;
    }

    Redirect::to("/")
}

async fn view_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Html<String>, AppError> {
    let view = state.gallery.view(&filename).await?;
    Ok(Html(pages::image_detail(&view)))
}

/// Raw image bytes, always labelled as JPEG.
async fn serve_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.gallery.image(&filename).await?;
    Ok(([(header::CONTENT_TYPE, "image/jpeg")], data))
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(router: Router, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
