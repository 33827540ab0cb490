//! Capture task: screenshot, storage, capture record, and status transitions.

mod common;

use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};

use common::{FakeScreenshots, MemoryStore, TestDb, PNG_BYTES};
use postwatch::models::{CaptureType, SubmissionStatus};
use postwatch::services::{
    HttpScreenshotClient, LocalObjectStore, ObjectStore, ScreenshotConfig, ScreenshotError,
    ScreenshotService,
};
use postwatch::tasks::{CaptureOutcome, CapturePayload, CaptureTask, TaskError};

fn task(db: &TestDb, screenshots: Arc<FakeScreenshots>, store: Arc<MemoryStore>) -> CaptureTask {
    CaptureTask::new(db.ctx.submissions(), db.ctx.captures(), screenshots, store)
}

fn payload(submission_id: &str, capture_type: CaptureType) -> CapturePayload {
    CapturePayload {
        submission_id: submission_id.to_string(),
        url: None,
        platform: None,
        capture_type,
    }
}

#[tokio::test]
async fn test_initial_capture_success() {
    let db = TestDb::new().await;
    let submission = db.insert_submission("sub-1", SubmissionStatus::Pending).await;
    let screenshots = FakeScreenshots::ok();
    let store = MemoryStore::new();

    let outcome = task(&db, screenshots.clone(), store.clone())
        .run(&payload("sub-1", CaptureType::Initial))
        .await
        .unwrap();

    let CaptureOutcome::Captured(capture) = outcome else {
        panic!("expected a capture");
    };
    assert!(capture.is_live);
    assert_eq!(capture.capture_type, CaptureType::Initial);
    assert_eq!(screenshots.requests(), vec![submission.content_url.clone()]);

    let paths = store.paths();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].starts_with("captures/sub-1/"));
    assert!(paths[0].ends_with(".png"));
    assert_eq!(
        capture.screenshot_url.as_deref(),
        Some(format!("https://cdn.test/content-captures/{}", paths[0]).as_str())
    );
    assert_eq!(capture.raw_metadata["size_bytes"], json!(PNG_BYTES.len()));
    assert_eq!(capture.raw_metadata["platform"], json!("tiktok"));

    let stored = db.ctx.captures().list_for_submission("sub-1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, capture.id);

    let sub = db.ctx.submissions().get("sub-1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubmissionStatus::Monitoring);
}

#[tokio::test]
async fn test_payload_url_overrides_content_url() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Pending).await;
    let screenshots = FakeScreenshots::ok();

    let mut p = payload("sub-1", CaptureType::Initial);
    p.url = Some("https://instagram.com/p/abc".to_string());
    task(&db, screenshots.clone(), MemoryStore::new())
        .run(&p)
        .await
        .unwrap();

    assert_eq!(screenshots.requests(), vec!["https://instagram.com/p/abc"]);
}

#[tokio::test]
async fn test_scheduled_capture_success_records_new_evidence() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Monitoring).await;
    let store = MemoryStore::new();
    let t = task(&db, FakeScreenshots::ok(), store.clone());

    t.run(&payload("sub-1", CaptureType::Initial)).await.unwrap();
    // Object paths are keyed by millisecond timestamp.
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    t.run(&payload("sub-1", CaptureType::Scheduled)).await.unwrap();

    let captures = db.ctx.captures().list_for_submission("sub-1").await.unwrap();
    assert_eq!(captures.len(), 2);
    assert_eq!(captures[1].capture_type, CaptureType::Scheduled);
    assert_ne!(captures[0].screenshot_url, captures[1].screenshot_url);

    let paths = store.paths();
    assert_eq!(paths.len(), 2);
    assert_ne!(paths[0], paths[1]);

    let sub = db.ctx.submissions().get("sub-1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubmissionStatus::Monitoring);
}

#[tokio::test]
async fn test_initial_capture_failure_still_moves_to_monitoring() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Pending).await;
    let store = MemoryStore::new();

    let err = task(&db, FakeScreenshots::failing(502), store.clone())
        .run(&payload("sub-1", CaptureType::Initial))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::RemoteService(_)));
    assert!(store.paths().is_empty());

    let captures = db.ctx.captures().list_for_submission("sub-1").await.unwrap();
    assert_eq!(captures.len(), 1);
    assert!(!captures[0].is_live);
    assert!(captures[0].screenshot_url.is_none());
    assert!(captures[0]
        .error_message
        .as_deref()
        .is_some_and(|m| m.contains("502")));

    let sub = db.ctx.submissions().get("sub-1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubmissionStatus::Monitoring);
}

#[tokio::test]
async fn test_scheduled_capture_failure_keeps_status() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Monitoring).await;

    let err = task(&db, FakeScreenshots::failing(500), MemoryStore::new())
        .run(&payload("sub-1", CaptureType::Scheduled))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::RemoteService(_)));

    let captures = db.ctx.captures().list_for_submission("sub-1").await.unwrap();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].capture_type, CaptureType::Scheduled);
    assert!(!captures[0].is_live);

    let sub = db.ctx.submissions().get("sub-1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubmissionStatus::Monitoring);
}

#[tokio::test]
async fn test_scheduled_capture_of_settled_submission_is_skipped() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Approved).await;
    let screenshots = FakeScreenshots::ok();

    let outcome = task(&db, screenshots.clone(), MemoryStore::new())
        .run(&payload("sub-1", CaptureType::Scheduled))
        .await
        .unwrap();

    assert!(matches!(outcome, CaptureOutcome::Skipped(SubmissionStatus::Approved)));
    assert!(screenshots.requests().is_empty());
    assert!(db
        .ctx
        .captures()
        .list_for_submission("sub-1")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_missing_submission_is_an_error() {
    let db = TestDb::new().await;

    let err = task(&db, FakeScreenshots::ok(), MemoryStore::new())
        .run(&payload("nope", CaptureType::Initial))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::SubmissionNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_unconfigured_screenshot_client_is_a_configuration_error() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Pending).await;

    let client = Arc::new(HttpScreenshotClient::new(ScreenshotConfig::default()).unwrap());
    let t = CaptureTask::new(
        db.ctx.submissions(),
        db.ctx.captures(),
        client,
        MemoryStore::new(),
    );

    let err = t
        .run(&payload("sub-1", CaptureType::Initial))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Configuration(_)));
}

/// What the mock screenshot endpoint saw.
#[derive(Clone, Default)]
struct Seen {
    requests: Arc<Mutex<Vec<(Option<String>, Value)>>>,
}

async fn mock_screenshot(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Vec<u8>, StatusCode> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.requests.lock().unwrap().push((auth, body.clone()));

    if body["url"] == json!("https://broken.example/post") {
        return Err(StatusCode::BAD_GATEWAY);
    }
    Ok(PNG_BYTES.to_vec())
}

async fn spawn_mock() -> (String, Seen) {
    let seen = Seen::default();
    let app = Router::new()
        .route("/screenshot", post(mock_screenshot))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/screenshot", addr), seen)
}

#[tokio::test]
async fn test_http_screenshot_client_against_mock() {
    let (endpoint, seen) = spawn_mock().await;
    let client = HttpScreenshotClient::new(ScreenshotConfig {
        api_url: Some(endpoint),
        api_key: Some("shot-key".to_string()),
        ..Default::default()
    })
    .unwrap();

    let bytes = client.capture("https://x.com/creator/status/1").await.unwrap();
    assert_eq!(bytes, PNG_BYTES);

    let err = client.capture("https://broken.example/post").await.unwrap_err();
    assert!(matches!(err, ScreenshotError::Status { status: 502, .. }));

    let requests = seen.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    let (auth, body) = &requests[0];
    assert_eq!(auth.as_deref(), Some("Bearer shot-key"));
    assert_eq!(body["url"], json!("https://x.com/creator/status/1"));
    assert_eq!(body["options"]["type"], json!("png"));
    assert_eq!(body["options"]["viewport"]["width"], json!(1280));
}

#[tokio::test]
async fn test_capture_end_to_end_with_local_store() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Pending).await;
    let (endpoint, _seen) = spawn_mock().await;

    let client = Arc::new(
        HttpScreenshotClient::new(ScreenshotConfig {
            api_url: Some(endpoint),
            api_key: Some("shot-key".to_string()),
            ..Default::default()
        })
        .unwrap(),
    );
    let root = db.dir.path().join("storage");
    let store: Arc<dyn ObjectStore> =
        Arc::new(LocalObjectStore::new(&root, "http://127.0.0.1:3040/storage/").unwrap());
    let t = CaptureTask::new(db.ctx.submissions(), db.ctx.captures(), client, store);

    let CaptureOutcome::Captured(capture) = t
        .run(&payload("sub-1", CaptureType::Initial))
        .await
        .unwrap()
    else {
        panic!("expected a capture");
    };

    let path = capture.raw_metadata["storage_path"].as_str().unwrap();
    assert_eq!(std::fs::read(root.join(path)).unwrap(), PNG_BYTES);
    assert_eq!(
        capture.screenshot_url.as_deref(),
        Some(format!("http://127.0.0.1:3040/storage/{}", path).as_str())
    );
}

#[tokio::test]
async fn test_status_write_failure_after_capture_is_retried_by_the_job() {
    let db = TestDb::new().await;
    db.insert_submission("sub-1", SubmissionStatus::Pending).await;
    db.exec(
        "CREATE TRIGGER reject_monitoring BEFORE UPDATE OF status ON submissions
         WHEN NEW.status = 'monitoring'
         BEGIN SELECT RAISE(ABORT, 'status write rejected'); END;",
    );
    let store = MemoryStore::new();
    let capture = task(&db, FakeScreenshots::ok(), store.clone());

    let err = capture
        .run(&payload("sub-1", CaptureType::Initial))
        .await
        .unwrap_err();
    assert!(matches!(err, TaskError::Database(_)));
    // Evidence is kept even though the status could not move.
    assert_eq!(db.ctx.captures().list_for_submission("sub-1").await.unwrap().len(), 1);

    // Once the store accepts writes again the retried job settles the submission.
    db.exec("DROP TRIGGER reject_monitoring;");
    let outcome = capture
        .run(&payload("sub-1", CaptureType::Initial))
        .await
        .unwrap();
    assert!(matches!(outcome, CaptureOutcome::Captured(_)));

    let sub = db.ctx.submissions().get("sub-1").await.unwrap().unwrap();
    assert_eq!(sub.status, SubmissionStatus::Monitoring);
    assert_eq!(db.ctx.captures().list_for_submission("sub-1").await.unwrap().len(), 2);
    assert_eq!(store.paths().len(), 2);
}
