//! Durable job queue: enqueue, lease, and record outcomes.
//!
//! Producers insert rows; workers poll for eligible jobs, lease each one with
//! a conditional update, run it, and record completion, a backoff retry, or
//! terminal failure. The job table is the only coordination point between
//! workers.

mod backoff;
mod db;
mod error;
pub mod executor;
mod handle;

pub use backoff::{Backoff, DEFAULT_BACKOFF_BASE_SECS};
pub use db::DbJobQueue;
pub use error::QueueError;
pub use executor::{DrainReport, JobExecutor};
pub use handle::JobHandle;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{EnqueueOptions, Job, JobKind};

/// What `fail()` did with the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Back to pending, eligible again at `at`.
    Retry { at: DateTime<Utc> },
    /// Attempts exhausted; the job will never run again.
    Failed,
}

/// A queue that owns the claim/complete/fail lifecycle of jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Insert a pending job. Returns its id.
    async fn enqueue(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        options: EnqueueOptions,
    ) -> Result<String, QueueError>;

    /// Jobs currently eligible for claiming, in dequeue order.
    async fn fetch_batch(&self, limit: usize) -> Result<Vec<Job>, QueueError>;

    /// Lease a job for this worker.
    ///
    /// `Ok(None)` means another worker won the race, or the job is no longer
    /// pending; the caller skips it.
    async fn claim(&self, job: &Job) -> Result<Option<JobHandle>, QueueError>;

    /// Mark a leased job completed.
    async fn complete(&self, handle: JobHandle) -> Result<(), QueueError>;

    /// Record a failed run: retry with backoff, or fail terminally once the
    /// job has used all of its attempts.
    async fn fail(&self, handle: JobHandle, error: &str) -> Result<FailOutcome, QueueError>;

    /// Return jobs whose lease is older than `timeout` to pending.
    async fn release_expired(&self, timeout: chrono::Duration) -> Result<usize, QueueError>;
}
