//! Job queue backed by the `job_queue` table.

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::{Backoff, FailOutcome, JobHandle, JobQueue, QueueError};
use crate::models::{EnqueueOptions, Job, JobKind};
use crate::repository::{ClaimOutcome, JobRepository};

pub struct DbJobQueue {
    repo: JobRepository,
    worker_id: String,
    backoff: Backoff,
}

impl DbJobQueue {
    pub fn new(repo: JobRepository, worker_id: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            repo,
            worker_id: worker_id.into(),
            backoff,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

#[async_trait]
impl JobQueue for DbJobQueue {
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<String, QueueError> {
        let job = Job::new(kind, payload, &options, Utc::now());
        self.repo.insert(&job).await?;
        debug!(job_id = %job.id, job_type = %kind, priority = job.priority, "Enqueued job");
        Ok(job.id)
    }

    async fn fetch_batch(&self, limit: usize) -> Result<Vec<Job>, QueueError> {
        Ok(self.repo.fetch_eligible(Utc::now(), limit).await?)
    }

    async fn claim(&self, job: &Job) -> Result<Option<JobHandle>, QueueError> {
        match self.repo.claim(&job.id, &self.worker_id, Utc::now()).await? {
            ClaimOutcome::Claimed(job) => Ok(Some(JobHandle::new(job, self.worker_id.clone()))),
            ClaimOutcome::Conflict => {
                debug!(job_id = %job.id, "Job already claimed by another worker");
                Ok(None)
            }
        }
    }

    async fn complete(&self, handle: JobHandle) -> Result<(), QueueError> {
        let job = handle.consume();
        if self
            .repo
            .mark_completed(&job.id, &self.worker_id, Utc::now())
            .await?
        {
            Ok(())
        } else {
            Err(QueueError::LeaseLost(job.id))
        }
    }

    async fn fail(&self, handle: JobHandle, error: &str) -> Result<FailOutcome, QueueError> {
        let job = handle.consume();

        let recorded = if job.is_last_attempt() {
            self.repo
                .mark_failed(&job.id, &self.worker_id, error)
                .await?
                .then_some(FailOutcome::Failed)
        } else {
            // attempts already counts this run; the delay is keyed on the
            // attempts made before it
            let prior = u32::try_from(job.attempts.saturating_sub(1)).unwrap_or(0);
            let at = Utc::now() + self.backoff.delay(prior);
            self.repo
                .schedule_retry(&job.id, &self.worker_id, at, error)
                .await?
                .then_some(FailOutcome::Retry { at })
        };

        recorded.ok_or(QueueError::LeaseLost(job.id))
    }

    async fn release_expired(&self, timeout: chrono::Duration) -> Result<usize, QueueError> {
        let released = self.repo.release_stale(Utc::now() - timeout).await?;
        if released > 0 {
            warn!("Released {} job(s) with expired leases", released);
        }
        Ok(released)
    }
}
