//! Lease handle for a claimed job.

use crate::models::Job;

/// A leased job. Consumed by `complete()` or `fail()`.
///
/// Dropping a handle without consuming it leaves the row `processing` with
/// our worker id in `locked_by`; only the lease reaper can recover it.
pub struct JobHandle {
    job: Job,
    worker_id: String,
    consumed: bool,
}

impl JobHandle {
    pub(crate) fn new(job: Job, worker_id: String) -> Self {
        Self {
            job,
            worker_id,
            consumed: false,
        }
    }

    /// The job as it stands after the claim (`attempts` includes this run).
    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub(crate) fn consume(mut self) -> Job {
        self.consumed = true;
        self.job.clone()
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if !self.consumed {
            tracing::warn!(
                job_id = %self.job.id,
                "JobHandle dropped without being completed or failed; job stays processing"
            );
        }
    }
}
