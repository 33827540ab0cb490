//! Process-wide wiring of the queue, executor, scheduler, and sweep.

use std::sync::Arc;

use anyhow::Context;

use crate::config::Settings;
use crate::repository::DbContext;
use crate::scheduler::{MonitoringScheduler, RetentionSweep};
use crate::services::{build_object_store, HttpScreenshotClient, ObjectStore, ScreenshotService};
use crate::tasks::CaptureTask;
use crate::work_queue::{Backoff, DbJobQueue, JobExecutor, JobQueue};

/// Everything one worker process runs, built once from [`Settings`].
pub struct Worker {
    db: DbContext,
    queue: Arc<DbJobQueue>,
    executor: JobExecutor,
    monitor: MonitoringScheduler,
    retention: RetentionSweep,
}

impl Worker {
    /// Build from settings with the HTTP screenshot client and the
    /// configured object store.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        settings
            .ensure_directories()
            .context("Failed to create data directory")?;
        let db = settings
            .create_db_context()
            .context("Failed to open database")?;
        let screenshots: Arc<dyn ScreenshotService> =
            Arc::new(HttpScreenshotClient::new(settings.screenshot.clone())?);
        let store = build_object_store(&settings.storage, &settings.data_dir)?;

        Ok(Self::with_services(db, settings, screenshots, store))
    }

    /// Build around explicit services.
    pub fn with_services(
        db: DbContext,
        settings: &Settings,
        screenshots: Arc<dyn ScreenshotService>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        let queue = Arc::new(DbJobQueue::new(
            db.jobs(),
            settings.worker_id.clone(),
            Backoff::new(settings.queue.backoff_base_secs),
        ));
        let shared: Arc<dyn JobQueue> = queue.clone();

        let capture = CaptureTask::new(db.submissions(), db.captures(), screenshots, store);
        let executor = JobExecutor::new(shared.clone(), capture)
            .with_batch_size(settings.queue.batch_size)
            .with_lease_timeout(settings.queue.lease_timeout());
        let monitor = MonitoringScheduler::new(db.monitoring(), db.submissions(), shared)
            .with_batch_size(settings.monitoring.batch_size);
        let retention = RetentionSweep::new(db.jobs(), settings.queue.retention_days);

        Self {
            db,
            queue,
            executor,
            monitor,
            retention,
        }
    }

    pub fn db(&self) -> &DbContext {
        &self.db
    }

    pub fn queue(&self) -> &Arc<DbJobQueue> {
        &self.queue
    }

    pub fn worker_id(&self) -> &str {
        self.queue.worker_id()
    }

    pub fn executor(&self) -> &JobExecutor {
        &self.executor
    }

    pub fn monitor(&self) -> &MonitoringScheduler {
        &self.monitor
    }

    pub fn retention(&self) -> &RetentionSweep {
        &self.retention
    }
}
