use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use titleblock_annotator::record::{PageRecord, PageStatus};
use titleblock_annotator::server::{router, AppState};
use titleblock_annotator::store::JsonFileStore;

/// A router over a fresh store holding one rendered page, `page-1`.
///
/// Keep the `TempDir` alive for the duration of the test.
pub fn build_test_app() -> (Router, Arc<JsonFileStore>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let mut record = PageRecord::new("page-1", Some("renders/page-1.png".into()));
    record.status = PageStatus::Rendered;
    store.put(&record).unwrap();

    let app = router(AppState {
        store: store.clone(),
    });
    (app, store, dir)
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
