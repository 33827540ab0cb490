//! Deletion of aged completed and failed jobs.

use chrono::{Duration, Utc};
use tracing::info;

use crate::repository::JobRepository;
use crate::work_queue::QueueError;

pub const DEFAULT_RETENTION_DAYS: i64 = 7;

pub struct RetentionSweep {
    jobs: JobRepository,
    retention: Duration,
}

impl RetentionSweep {
    pub fn new(jobs: JobRepository, retention_days: i64) -> Self {
        Self {
            jobs,
            retention: Duration::days(retention_days.max(1)),
        }
    }

    /// Delete terminal jobs created more than the retention window ago.
    /// Pending and processing jobs are never touched, however old.
    pub async fn run(&self) -> Result<usize, QueueError> {
        let cutoff = Utc::now() - self.retention;
        let deleted = self.jobs.delete_finished_before(cutoff).await?;
        info!("Retention sweep deleted {} job(s) created before {}", deleted, cutoff);
        Ok(deleted)
    }
}
