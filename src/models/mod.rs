//! Domain models for the job queue and content capture.

mod capture;
mod job;
mod monitoring;
mod submission;

pub use capture::{CaptureType, SubmissionCapture};
pub use job::{EnqueueOptions, Job, JobKind, JobStatus, DEFAULT_MAX_ATTEMPTS};
pub use monitoring::{MonitoringSchedule, DEFAULT_CHECK_INTERVAL_HOURS};
pub use submission::{Submission, SubmissionStatus};
