//! Drain cycle: fetch eligible jobs, lease them one at a time, run them.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::{FailOutcome, JobQueue, QueueError};
use crate::models::{CaptureType, Job, JobKind};
use crate::tasks::{CapturePayload, CaptureTask, TaskError};

/// Default number of jobs fetched per drain cycle.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Counts from one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub fetched: usize,
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub failed: usize,
    /// Lost the lease race, or the claim itself errored.
    pub skipped: usize,
}

impl DrainReport {
    /// Jobs this cycle actually ran.
    pub fn processed(&self) -> usize {
        self.claimed
    }
}

pub struct JobExecutor {
    queue: Arc<dyn JobQueue>,
    capture: CaptureTask,
    batch_size: usize,
    lease_timeout: Option<chrono::Duration>,
}

impl JobExecutor {
    pub fn new(queue: Arc<dyn JobQueue>, capture: CaptureTask) -> Self {
        Self {
            queue,
            capture,
            batch_size: DEFAULT_BATCH_SIZE,
            lease_timeout: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Release leases older than `timeout` at the start of every cycle.
    pub fn with_lease_timeout(mut self, timeout: Option<chrono::Duration>) -> Self {
        self.lease_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Run one drain cycle.
    ///
    /// Only a failing selection query fails the cycle. Task errors become
    /// retries or terminal failures; a failure to record an outcome is
    /// logged and the cycle moves on.
    pub async fn drain(&self) -> Result<DrainReport, QueueError> {
        if let Some(timeout) = self.lease_timeout {
            if let Err(e) = self.queue.release_expired(timeout).await {
                warn!("Failed to release expired leases: {}", e);
            }
        }

        let jobs = self.queue.fetch_batch(self.batch_size).await?;
        let mut report = DrainReport {
            fetched: jobs.len(),
            ..Default::default()
        };
        if jobs.is_empty() {
            debug!("No eligible jobs");
            return Ok(report);
        }

        for job in jobs {
            let handle = match self.queue.claim(&job).await {
                Ok(Some(handle)) => handle,
                Ok(None) => {
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(job_id = %job.id, "Failed to claim job: {}", e);
                    report.skipped += 1;
                    continue;
                }
            };
            report.claimed += 1;

            let span = info_span!(
                "job",
                job_id = %handle.job().id,
                job_type = %handle.job().job_type,
                attempt = handle.job().attempts
            );

            async {
                match self.execute(handle.job()).await {
                    Ok(()) => match self.queue.complete(handle).await {
                        Ok(()) => {
                            report.completed += 1;
                            debug!("Job completed");
                        }
                        Err(e) => error!("Failed to mark job completed: {}", e),
                    },
                    Err(task_err) => {
                        let message = task_err.to_string();
                        match self.queue.fail(handle, &message).await {
                            Ok(FailOutcome::Retry { at }) => {
                                report.retried += 1;
                                warn!("Job failed, retrying at {}: {}", at, message);
                            }
                            Ok(FailOutcome::Failed) => {
                                report.failed += 1;
                                error!("Job failed permanently: {}", message);
                            }
                            Err(e) => error!("Failed to record job failure ({}): {}", message, e),
                        }
                    }
                }
            }
            .instrument(span)
            .await;
        }

        info!(
            "Drain cycle: {} fetched, {} claimed, {} completed, {} retried, {} failed, {} skipped",
            report.fetched,
            report.claimed,
            report.completed,
            report.retried,
            report.failed,
            report.skipped
        );
        Ok(report)
    }

    /// Dispatch a leased job to its handler.
    async fn execute(&self, job: &Job) -> Result<(), TaskError> {
        let Some(kind) = job.kind() else {
            warn!("Unknown job type '{}', marking done", job.job_type);
            return Ok(());
        };

        match kind {
            JobKind::CaptureSubmission => {
                let payload = CapturePayload::from_value(&job.payload)?;
                self.capture.run(&payload).await.map(|_| ())
            }
            JobKind::MonitorSubmission => {
                let mut payload = CapturePayload::from_value(&job.payload)?;
                payload.capture_type = CaptureType::Scheduled;
                self.capture.run(&payload).await.map(|_| ())
            }
            JobKind::SendEmail | JobKind::SendPush | JobKind::ProcessPayment => {
                info!("No {} handler in this worker, marking done", kind);
                Ok(())
            }
        }
    }
}
