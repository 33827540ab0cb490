//! Recurring scan that turns due monitoring schedules into capture jobs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{EnqueueOptions, JobKind, MonitoringSchedule};
use crate::repository::{MonitoringRepository, SubmissionRepository};
use crate::work_queue::{JobQueue, QueueError};

/// Default number of due schedules handled per scan.
pub const DEFAULT_MONITOR_BATCH_SIZE: usize = 20;

/// Priority of follow-up capture jobs, above producer defaults.
pub const MONITOR_JOB_PRIORITY: i32 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorReport {
    pub scanned: usize,
    pub enqueued: usize,
    /// Schedules switched off this scan, for a final submission status or
    /// because their last check was spent.
    pub deactivated: usize,
}

enum CheckOutcome {
    Enqueued { exhausted: bool },
    Deactivated,
    /// Another scan spent this check first.
    Taken,
}

pub struct MonitoringScheduler {
    schedules: MonitoringRepository,
    submissions: SubmissionRepository,
    queue: Arc<dyn JobQueue>,
    batch_size: usize,
}

impl MonitoringScheduler {
    pub fn new(
        schedules: MonitoringRepository,
        submissions: SubmissionRepository,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self {
            schedules,
            submissions,
            queue,
            batch_size: DEFAULT_MONITOR_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Scan due schedules once. A failing row is logged and skipped.
    pub async fn scan(&self) -> Result<MonitorReport, QueueError> {
        let now = Utc::now();
        let due = self.schedules.due(now, self.batch_size).await?;
        let mut report = MonitorReport {
            scanned: due.len(),
            ..Default::default()
        };

        for schedule in &due {
            match self.check(schedule, now).await {
                Ok(CheckOutcome::Enqueued { exhausted }) => {
                    report.enqueued += 1;
                    if exhausted {
                        report.deactivated += 1;
                    }
                }
                Ok(CheckOutcome::Deactivated) => report.deactivated += 1,
                Ok(CheckOutcome::Taken) => {
                    debug!(schedule_id = %schedule.id, "Check already taken by another scan")
                }
                Err(e) => warn!(
                    schedule_id = %schedule.id,
                    "Monitoring check failed for submission {}: {}",
                    schedule.submission_id,
                    e
                ),
            }
        }

        if report.scanned > 0 {
            info!(
                "Monitoring scan: {} due, {} enqueued, {} deactivated",
                report.scanned, report.enqueued, report.deactivated
            );
        } else {
            debug!("No monitoring checks due");
        }
        Ok(report)
    }

    async fn check(
        &self,
        schedule: &MonitoringSchedule,
        now: DateTime<Utc>,
    ) -> Result<CheckOutcome, QueueError> {
        let submission = match self.submissions.get(&schedule.submission_id).await? {
            Some(submission) if !submission.status.is_terminal() => submission,
            Some(submission) => {
                info!(
                    "Submission {} is {}, stopping monitoring",
                    submission.id, submission.status
                );
                self.schedules.deactivate(&schedule.id).await?;
                return Ok(CheckOutcome::Deactivated);
            }
            None => {
                warn!(
                    "Submission {} no longer exists, stopping monitoring",
                    schedule.submission_id
                );
                self.schedules.deactivate(&schedule.id).await?;
                return Ok(CheckOutcome::Deactivated);
            }
        };

        // Claim the check before enqueueing so concurrent scans cannot both
        // produce a job for it. The next check is at least one interval
        // from now, so missed checks are not spent back to back.
        let next_check_at =
            (schedule.next_check_at + schedule.interval()).max(now + schedule.interval());
        let Some(claimed) = self
            .schedules
            .claim_check(&schedule.id, schedule.next_check_at, next_check_at, now)
            .await?
        else {
            return Ok(CheckOutcome::Taken);
        };

        let payload = serde_json::json!({
            "submission_id": submission.id,
            "url": submission.content_url,
            "platform": submission.platform,
            "capture_type": "scheduled",
        });
        self.queue
            .enqueue(
                JobKind::MonitorSubmission,
                payload,
                EnqueueOptions::default().with_priority(MONITOR_JOB_PRIORITY),
            )
            .await?;

        Ok(CheckOutcome::Enqueued {
            exhausted: !claimed.is_active,
        })
    }
}
