//! HTTP surface: health probe and bearer-authenticated trigger.

mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

use common::{FakeScreenshots, MemoryStore, TestDb};
use postwatch::models::{EnqueueOptions, JobKind};
use postwatch::server::{create_router, AppState};
use postwatch::work_queue::JobQueue;

fn router(db: &TestDb, service_key: Option<&str>) -> Router {
    let worker = Arc::new(db.worker(FakeScreenshots::ok(), MemoryStore::new()));
    create_router(AppState {
        worker,
        service_key: service_key.map(Arc::from),
        storage_dir: None,
    })
}

fn trigger(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/trigger");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let db = TestDb::new().await;
    let response = router(&db, None)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], json!("ok"));
    assert!(body["timestamp"].as_str().is_some_and(|t| t.ends_with('Z')));
}

#[tokio::test]
async fn test_trigger_rejects_missing_and_wrong_tokens() {
    let db = TestDb::new().await;
    let app = router(&db, Some("s3cret"));

    for request in [trigger(None), trigger(Some("wrong"))] {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "Unauthorized"})
        );
    }
}

#[tokio::test]
async fn test_trigger_rejects_everything_without_a_service_key() {
    let db = TestDb::new().await;
    let response = router(&db, None)
        .oneshot(trigger(Some("")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_trigger_drains_the_queue() {
    let db = TestDb::new().await;
    let worker = Arc::new(db.worker(FakeScreenshots::ok(), MemoryStore::new()));
    for _ in 0..2 {
        worker
            .queue()
            .enqueue(JobKind::SendEmail, json!({}), EnqueueOptions::default())
            .await
            .unwrap();
    }
    let app = create_router(AppState {
        worker,
        service_key: Some(Arc::from("s3cret")),
        storage_dir: None,
    });

    let response = app.clone().oneshot(trigger(Some("s3cret"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["processed"], json!(2));

    // Queue is empty now.
    let response = app.oneshot(trigger(Some("s3cret"))).await.unwrap();
    assert_eq!(json_body(response).await["processed"], json!(0));
}

#[tokio::test]
async fn test_trigger_reports_store_failure() {
    let db = TestDb::new().await;
    let app = router(&db, Some("s3cret"));
    db.exec("DROP TABLE job_queue;");

    let response = app.oneshot(trigger(Some("s3cret"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn test_storage_is_served_for_local_backend() {
    let db = TestDb::new().await;
    let storage = db.dir.path().join("storage");
    std::fs::create_dir_all(storage.join("captures/sub-1")).unwrap();
    std::fs::write(storage.join("captures/sub-1/1.png"), common::PNG_BYTES).unwrap();

    let app = create_router(AppState {
        worker: Arc::new(db.worker(FakeScreenshots::ok(), MemoryStore::new())),
        service_key: None,
        storage_dir: Some(storage),
    });

    let response = app
        .oneshot(
            Request::builder()
                .uri("/storage/captures/sub-1/1.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], common::PNG_BYTES);
}
