//! The editor's HTTP client against the real router on a local socket.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::Value;

use common::build_test_app;
use titleblock_annotator::client::{HttpPageService, PageService};
use titleblock_annotator::contract::{ClearRequest, SaveRequest};
use titleblock_annotator::error::ServiceError;
use titleblock_annotator::field::{FieldAreas, FieldKey};
use titleblock_annotator::fingerprint::parse_fingerprint;
use titleblock_annotator::geometry::{NormPoint, NormRect};
use titleblock_annotator::record::{PageRecord, PageSeed, PageStatus};
use titleblock_annotator::session::{Session, Status};
use titleblock_annotator::store::{JsonFileStore, PageStore};

struct Served {
    service: Arc<HttpPageService>,
    store: Arc<JsonFileStore>,
    _dir: tempfile::TempDir,
}

async fn serve() -> Served {
    let (app, store, dir) = build_test_app();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });

    let base_url = format!("http://{addr}/");
    let service = tokio::task::spawn_blocking(move || {
        HttpPageService::new(&base_url, ".", Duration::from_secs(5)).unwrap()
    })
    .await
    .unwrap();
    Served {
        service: Arc::new(service),
        store,
        _dir: dir,
    }
}

/// Run a blocking client call off the async workers.
async fn call<T, F>(service: &Arc<HttpPageService>, op: F) -> T
where
    F: FnOnce(&HttpPageService) -> T + Send + 'static,
    T: Send + 'static,
{
    let service = Arc::clone(service);
    tokio::task::spawn_blocking(move || op(service.as_ref())).await.unwrap()
}

fn request(page_id: &str) -> SaveRequest {
    let titleblock = NormRect::new(0.55, 0.8, 0.4, 0.15).unwrap();
    let mut areas = FieldAreas::new();
    areas.set(FieldKey::DrawingTitle, NormRect::new(0.1, 0.2, 0.6, 0.3).unwrap());
    SaveRequest::new(page_id, &titleblock, &areas)
}

#[tokio::test(flavor = "multi_thread")]
async fn save_returns_the_stored_fingerprint() {
    let served = serve().await;

    let fingerprint = call(&served.service, |s| s.save(&request("page-1"))).await.unwrap();
    assert_eq!(fingerprint["version"], 2);
    let areas = parse_fingerprint(Some(&fingerprint)).unwrap().field_areas();
    assert_eq!(areas.len(), 1);
    assert!(areas.get(FieldKey::DrawingTitle).is_some());

    let record = served.store.get("page-1").unwrap();
    assert_eq!(record.status, PageStatus::Tagged);
    assert_eq!(record.fingerprint.as_ref(), Some(&fingerprint));
}

#[tokio::test(flavor = "multi_thread")]
async fn clear_sends_its_body_with_delete() {
    let served = serve().await;
    call(&served.service, |s| s.save(&request("page-1"))).await.unwrap();

    call(&served.service, |s| s.clear(&ClearRequest { page_id: "page-1".into() }))
        .await
        .unwrap();

    let record = served.store.get("page-1").unwrap();
    assert_eq!(record.titleblock(), None);
    assert_eq!(record.fingerprint, None);
    assert_eq!(record.status, PageStatus::Tagged);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_messages_come_back_verbatim() {
    let served = serve().await;

    let saved = call(&served.service, |s| s.save(&request("page-404"))).await;
    assert_matches!(
        saved,
        Err(ServiceError::Rejected { status: 404, ref message }) if message == "page 'page-404' not found"
    );

    let cleared = call(&served.service, |s| s.clear(&ClearRequest { page_id: "page-404".into() })).await;
    assert_matches!(cleared, Err(ServiceError::Rejected { status: 404, .. }));

    let looked_up = call(&served.service, |s| s.load_page("page-404")).await;
    assert_matches!(looked_up, Err(ServiceError::Rejected { status: 404, .. }));

    std::fs::write(served.store.root().join("broken.json"), "{ not json").unwrap();
    let corrupt = call(&served.service, |s| s.load_page("broken")).await;
    assert_matches!(
        corrupt,
        Err(ServiceError::Rejected { status: 500, ref message }) if message.starts_with("page record is corrupt")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_save_shows_the_server_text_in_the_status_line() {
    let served = serve().await;
    let mut session = Session::new(PageSeed::from(&PageRecord::new("page-404", None)));

    session.page_pointer_down(NormPoint::new(0.1, 0.1));
    session.page_pointer_up(Some(NormPoint::new(0.5, 0.3)));
    session.confirm_region().unwrap();
    let save = session.begin_save().unwrap();

    let outcome: Result<Value, ServiceError> = call(&served.service, move |s| s.save(&save)).await;
    session.finish_save(outcome);

    assert_eq!(session.busy(), None);
    assert_matches!(
        session.status(),
        Some(Status::Error(text)) if text == "Save failed: page 'page-404' not found"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn lookup_returns_the_seeded_record() {
    let served = serve().await;
    let record = call(&served.service, |s| s.load_page("page-1")).await.unwrap();
    assert_eq!(record.id, "page-1");
    assert_eq!(record.image_ref.as_deref(), Some("renders/page-1.png"));
    assert_eq!(record.status, PageStatus::Rendered);
}
