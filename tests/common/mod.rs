//! Shared fixtures: a migrated throwaway database and in-process fakes for
//! the screenshot service and object storage.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use postwatch::config::Settings;
use postwatch::models::{EnqueueOptions, Job, JobKind, JobStatus, Submission, SubmissionStatus};
use postwatch::repository::DbContext;
use postwatch::services::{ObjectStore, ScreenshotError, ScreenshotService, StorageError};
use postwatch::worker::Worker;

/// A tiny valid PNG header; the worker never decodes it.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";

pub struct TestDb {
    pub dir: TempDir,
    pub ctx: DbContext,
    pub settings: Settings,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
        settings.worker_id = "test-worker".to_string();

        let ctx = settings.create_db_context().unwrap();
        ctx.migrate().await.unwrap();
        Self { dir, ctx, settings }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("postwatch.db")
    }

    /// Run raw SQL, for states the public API never produces.
    pub fn exec(&self, sql: &str) {
        let conn = rusqlite::Connection::open(self.db_path()).unwrap();
        conn.execute_batch(sql).unwrap();
    }

    /// Worker over this database with the given fakes.
    pub fn worker(&self, screenshots: Arc<FakeScreenshots>, store: Arc<MemoryStore>) -> Worker {
        Worker::with_services(self.ctx.clone(), &self.settings, screenshots, store)
    }

    pub async fn insert_submission(&self, id: &str, status: SubmissionStatus) -> Submission {
        let mut submission = Submission::new(
            id,
            format!("https://www.tiktok.com/@creator/video/{}", id),
            Some("tiktok"),
        );
        submission.status = status;
        self.ctx.submissions().insert(&submission).await.unwrap();
        submission
    }

    /// Insert a job directly, bypassing the queue, with a chosen status and age.
    pub async fn insert_job(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        status: JobStatus,
        created_at: DateTime<Utc>,
    ) -> Job {
        let mut job = Job::new(kind, payload, &EnqueueOptions::default(), created_at);
        job.status = status;
        self.ctx.jobs().insert(&job).await.unwrap();
        job
    }
}

/// Screenshot service returning canned bytes, or failing on demand.
#[derive(Default)]
pub struct FakeScreenshots {
    pub fail_with_status: Mutex<Option<u16>>,
    pub requested: Mutex<Vec<String>>,
}

impl FakeScreenshots {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(status: u16) -> Arc<Self> {
        let fake = Self::default();
        *fake.fail_with_status.lock().unwrap() = Some(status);
        Arc::new(fake)
    }

    pub fn requests(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScreenshotService for FakeScreenshots {
    async fn capture(&self, url: &str) -> Result<Vec<u8>, ScreenshotError> {
        self.requested.lock().unwrap().push(url.to_string());
        match *self.fail_with_status.lock().unwrap() {
            Some(status) => Err(ScreenshotError::Status {
                status,
                body: "render failed".to_string(),
            }),
            None => Ok(PNG_BYTES.to_vec()),
        }
    }
}

/// Object store keeping uploads in memory.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<Vec<(String, Vec<u8>, String)>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn paths(&self) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .map(|(path, _, _)| path.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects.lock().unwrap().push((
            path.to_string(),
            bytes.to_vec(),
            content_type.to_string(),
        ));
        Ok(())
    }

    fn public_url(&self, path: &str) -> Result<String, StorageError> {
        Ok(format!("https://cdn.test/content-captures/{}", path))
    }
}
