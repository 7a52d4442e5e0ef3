//! HTTP route tests.
//!
//! Drives the router with an in-memory object store and a canned vision model.

use std::sync::{Arc, Mutex};

use ai_image_gallery::describe::{DescriptionGenerator, VisionModel};
use ai_image_gallery::error::{DescribeError, StorageError};
use ai_image_gallery::server::{create_router, AppState};
use ai_image_gallery::storage::{MemoryStore, ObjectStore};
use ai_image_gallery::GalleryService;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "gallery-test-boundary";

struct CannedModel {
    reply: String,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl VisionModel for CannedModel {
    async fn generate(
        &self,
        _image: &[u8],
        mime_type: &str,
        _prompt: &str,
    ) -> Result<String, DescribeError> {
        self.calls.lock().unwrap().push(mime_type.to_string());
        Ok(self.reply.clone())
    }
}

/// Memory store that rejects writes to keys ending in `suffix`.
struct FailingStore {
    inner: MemoryStore,
    suffix: &'static str,
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        if key.ends_with(self.suffix) {
            return Err(StorageError::Http {
                status: 503,
                body: "backend unavailable".to_string(),
            });
        }
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.inner.get(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        self.inner.exists(key).await
    }

    async fn list(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list().await
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.inner.delete(key).await
    }
}

struct TestApp {
    router: Router,
    store: Arc<dyn ObjectStore>,
    model: Arc<CannedModel>,
    scratch: TempDir,
}

fn test_app(reply: &str) -> TestApp {
    test_app_with_store(Arc::new(MemoryStore::new()), reply)
}

fn test_app_with_store(store: Arc<dyn ObjectStore>, reply: &str) -> TestApp {
    let model = Arc::new(CannedModel {
        reply: reply.to_string(),
        calls: Mutex::new(Vec::new()),
    });
    let scratch = TempDir::new().unwrap();
    let gallery = GalleryService::new(
        store.clone(),
        DescriptionGenerator::new(model.clone()),
        scratch.path(),
    );

    TestApp {
        router: create_router(AppState::new(gallery)),
        store,
        model,
        scratch,
    }
}

fn described(title: &str, description: &str) -> String {
    format!(
        "```json\n{{\"title\":\"{}\",\"description\":\"{}\"}}\n```",
        title, description
    )
}

fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn upload(app: &TestApp, filename: &str, data: &[u8]) -> StatusCode {
    let response = app
        .router
        .clone()
        .oneshot(upload_request(multipart_body(
            "image",
            filename,
            "image/jpeg",
            data,
        )))
        .await
        .unwrap();
    let status = response.status();
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/",
        "uploads always redirect to the gallery"
    );
    status
}

async fn get(app: &TestApp, uri: &str) -> (StatusCode, Option<String>, Vec<u8>) {
    let response = app
        .router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, content_type, bytes.to_vec())
}

async fn get_html(app: &TestApp, uri: &str) -> String {
    let (status, _, body) = get(app, uri).await;
    assert_eq!(status, StatusCode::OK);
    String::from_utf8(body).unwrap()
}

fn scratch_is_empty(app: &TestApp) -> bool {
    std::fs::read_dir(app.scratch.path()).unwrap().next().is_none()
}

#[tokio::test]
async fn upload_then_gallery_lists_image_and_description() {
    let app = test_app(&described("Beach", "Waves at dusk"));

    assert_eq!(upload(&app, "x.jpg", b"jpeg-bytes").await, StatusCode::SEE_OTHER);

    let page = get_html(&app, "/").await;
    assert!(page.contains(r#"href="/view_image/x.jpg""#));
    // description objects are listed too
    assert!(page.contains(r#"href="/view_image/x.jpg.json""#));

    assert_eq!(app.model.calls.lock().unwrap().as_slice(), ["image/jpeg"]);
    assert!(scratch_is_empty(&app));
}

#[tokio::test]
async fn stored_description_is_pretty_printed() {
    let app = test_app("```json\n{\"title\":\"A\",\"description\":\"B\"}\n```");
    upload(&app, "a.jpg", b"x").await;

    let stored = app.store.get_text("a.jpg.json").await.unwrap();
    assert_eq!(stored, "{\n    \"title\": \"A\",\n    \"description\": \"B\"\n}");
}

#[tokio::test]
async fn prose_reply_stores_no_description() {
    let app = test_app("I cannot identify this image");

    assert_eq!(upload(&app, "blurry.jpg", b"x").await, StatusCode::SEE_OTHER);

    assert_eq!(
        app.store.list().await.unwrap(),
        vec!["blurry.jpg".to_string()]
    );
    assert!(scratch_is_empty(&app));
}

#[tokio::test]
async fn detail_without_description_uses_placeholders() {
    let app = test_app("nope");
    upload(&app, "plain.jpg", b"x").await;

    let page = get_html(&app, "/view_image/plain.jpg").await;
    assert!(page.contains("<h1>Untitled</h1>"));
    assert!(page.contains("No description available."));
    assert!(page.contains(r#"src="/images/plain.jpg""#));
}

#[tokio::test]
async fn detail_with_malformed_description_uses_placeholders() {
    let app = test_app("nope");
    app.store
        .put("broken.jpg", b"x".to_vec(), "image/jpeg")
        .await
        .unwrap();
    app.store
        .put("broken.jpg.json", b"{\"title\": ".to_vec(), "application/json")
        .await
        .unwrap();

    let page = get_html(&app, "/view_image/broken.jpg").await;
    assert!(page.contains("<h1>Untitled</h1>"));
    assert!(page.contains("No description available."));
}

#[tokio::test]
async fn detail_round_trips_stored_description() {
    let app = test_app("unused");
    app.store.put("t.jpg", b"x".to_vec(), "image/jpeg").await.unwrap();
    app.store
        .put(
            "t.jpg.json",
            br#"{"title":"T","description":"D"}"#.to_vec(),
            "application/json",
        )
        .await
        .unwrap();

    let page = get_html(&app, "/view_image/t.jpg").await;
    assert!(page.contains("<h1>T</h1>"));
    assert!(page.contains(r#"<p class="result-text">D</p>"#));
}

#[tokio::test]
async fn detail_ignores_extra_description_fields() {
    let app = test_app("unused");
    app.store.put("t.jpg", b"x".to_vec(), "image/jpeg").await.unwrap();
    app.store
        .put(
            "t.jpg.json",
            br#"{"title":"T","description":"D","tags":["x"]}"#.to_vec(),
            "application/json",
        )
        .await
        .unwrap();

    let page = get_html(&app, "/view_image/t.jpg").await;
    assert!(page.contains("<h1>T</h1>"));
    assert!(page.contains(r#"<p class="result-text">D</p>"#));
}

#[tokio::test]
async fn failed_description_write_still_redirects() {
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        suffix: ".json",
    });
    let app = test_app_with_store(store, &described("Beach", "Waves"));

    assert_eq!(upload(&app, "x.jpg", b"x").await, StatusCode::SEE_OTHER);

    assert_eq!(app.store.list().await.unwrap(), vec!["x.jpg".to_string()]);
    assert!(scratch_is_empty(&app));
    let page = get_html(&app, "/view_image/x.jpg").await;
    assert!(page.contains("<h1>Untitled</h1>"));
}

#[tokio::test]
async fn failed_image_write_still_redirects() {
    let store = Arc::new(FailingStore {
        inner: MemoryStore::new(),
        suffix: ".jpg",
    });
    let app = test_app_with_store(store, &described("Beach", "Waves"));

    assert_eq!(upload(&app, "x.jpg", b"x").await, StatusCode::SEE_OTHER);

    assert!(app.store.list().await.unwrap().is_empty());
    assert!(app.model.calls.lock().unwrap().is_empty());
    assert!(scratch_is_empty(&app));
}

#[tokio::test]
async fn detail_for_missing_image_is_server_error() {
    let app = test_app("unused");
    let (status, _, _) = get(&app, "/view_image/ghost.jpg").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn second_upload_overwrites_image() {
    let app = test_app(&described("First", "one"));
    upload(&app, "same.jpg", b"first").await;
    upload(&app, "same.jpg", b"second").await;

    let (status, _, body) = get(&app, "/images/same.jpg").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"second");
    assert_eq!(
        app.store.list().await.unwrap(),
        vec!["same.jpg".to_string(), "same.jpg.json".to_string()]
    );
}

#[tokio::test]
async fn images_are_always_served_as_jpeg() {
    let app = test_app("unused");
    app.store
        .put("logo.png", b"\x89PNG\r\n\x1a\n".to_vec(), "image/png")
        .await
        .unwrap();

    let (status, content_type, body) = get(&app, "/images/logo.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(body, b"\x89PNG\r\n\x1a\n");
}

#[tokio::test]
async fn missing_image_is_server_error() {
    let app = test_app("unused");
    let (status, _, _) = get(&app, "/images/ghost.jpg").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn upload_without_file_is_a_no_op() {
    let app = test_app("unused");

    // file input left empty: browsers send the field with an empty filename
    let status = app
        .router
        .clone()
        .oneshot(upload_request(multipart_body(
            "image",
            "",
            "application/octet-stream",
            b"",
        )))
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::SEE_OTHER);

    // wrong field name
    let status = app
        .router
        .clone()
        .oneshot(upload_request(multipart_body(
            "photo",
            "x.jpg",
            "image/jpeg",
            b"x",
        )))
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::SEE_OTHER);

    // not multipart at all
    let status = app
        .router
        .clone()
        .oneshot(Request::post("/").body(Body::from("hello")).unwrap())
        .await
        .unwrap()
        .status();
    assert_eq!(status, StatusCode::SEE_OTHER);

    assert!(app.store.list().await.unwrap().is_empty());
    assert!(app.model.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generic_content_type_is_sniffed() {
    let app = test_app(&described("P", "png"));
    let body = multipart_body(
        "image",
        "pic.png",
        "application/octet-stream",
        b"\x89PNG\r\n\x1a\nrest",
    );
    app.router.clone().oneshot(upload_request(body)).await.unwrap();

    assert_eq!(app.model.calls.lock().unwrap().as_slice(), ["image/png"]);
}

#[tokio::test]
async fn empty_gallery_renders() {
    let app = test_app("unused");
    let page = get_html(&app, "/").await;
    assert!(page.contains("No images uploaded yet."));
}
