//! Job model for the durable work queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attempts allowed before a job is marked failed, unless the producer overrides it.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// The closed set of job kinds producers may enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    CaptureSubmission,
    MonitorSubmission,
    SendEmail,
    SendPush,
    ProcessPayment,
}

impl JobKind {
    pub const ALL: [JobKind; 5] = [
        Self::CaptureSubmission,
        Self::MonitorSubmission,
        Self::SendEmail,
        Self::SendPush,
        Self::ProcessPayment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CaptureSubmission => "capture_submission",
            Self::MonitorSubmission => "monitor_submission",
            Self::SendEmail => "send_email",
            Self::SendPush => "send_push",
            Self::ProcessPayment => "process_payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a job.
///
/// `pending -> processing -> {completed | pending (retry) | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal jobs never transition again and are eligible for the retention sweep.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A unit of deferred work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// Raw type tag as stored. Rows written by other producers may carry tags
    /// outside [`JobKind`], so the tag is kept verbatim and parsed on dispatch.
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    /// Higher dequeues first.
    pub priority: i32,
    /// Not eligible before this instant.
    pub scheduled_for: DateTime<Utc>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Producer-side knobs for [`crate::work_queue::JobQueue::enqueue`].
#[derive(Debug, Clone)]
pub struct EnqueueOptions {
    pub priority: i32,
    /// `None` means "now".
    pub scheduled_for: Option<DateTime<Utc>>,
    pub max_attempts: i32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            priority: 0,
            scheduled_for: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EnqueueOptions {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

impl Job {
    /// Create a new pending job.
    pub fn new(
        kind: JobKind,
        payload: serde_json::Value,
        options: &EnqueueOptions,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: kind.as_str().to_string(),
            payload,
            status: JobStatus::Pending,
            priority: options.priority,
            scheduled_for: options.scheduled_for.unwrap_or(now),
            attempts: 0,
            max_attempts: options.max_attempts.max(1),
            locked_by: None,
            locked_at: None,
            error_message: None,
            created_at: now,
            completed_at: None,
        }
    }

    /// Parsed job kind, or `None` for a tag this worker does not know.
    pub fn kind(&self) -> Option<JobKind> {
        JobKind::from_str(&self.job_type)
    }

    /// Whether the selection predicate matches this job at `now`.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.scheduled_for <= now && self.locked_by.is_none()
    }

    /// Whether a failure of the current attempt exhausts the job.
    ///
    /// `attempts` already counts the running attempt once the job is claimed.
    pub fn is_last_attempt(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_job_kind_round_trips_all_tags() {
        for kind in JobKind::ALL {
            assert_eq!(JobKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(JobKind::from_str("resize_avatar"), None);
    }

    #[test]
    fn test_new_job_defaults() {
        let now = Utc::now();
        let job = Job::new(
            JobKind::SendEmail,
            serde_json::json!({"to": "a@example.com"}),
            &EnqueueOptions::default(),
            now,
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(job.scheduled_for, now);
        assert!(job.is_eligible(now));
    }

    #[test]
    fn test_future_or_locked_jobs_are_not_eligible() {
        let now = Utc::now();
        let options = EnqueueOptions::default().scheduled_for(now + Duration::minutes(5));
        let mut job = Job::new(JobKind::SendPush, serde_json::json!({}), &options, now);
        assert!(!job.is_eligible(now));

        job.scheduled_for = now;
        job.locked_by = Some("worker-a".to_string());
        assert!(!job.is_eligible(now));
    }

    #[test]
    fn test_max_attempts_is_at_least_one() {
        let options = EnqueueOptions {
            max_attempts: 0,
            ..Default::default()
        };
        let job = Job::new(JobKind::SendPush, serde_json::json!({}), &options, Utc::now());
        assert_eq!(job.max_attempts, 1);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }
}
