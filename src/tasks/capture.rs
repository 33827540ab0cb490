//! Screenshot capture of a submitted social post.
//!
//! One run renders the post, stores the PNG, writes a capture record, and
//! moves the submission's status. Every run writes a fresh object and a
//! fresh record, so retries never overwrite earlier evidence.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::TaskError;
use crate::models::{CaptureType, SubmissionCapture, SubmissionStatus};
use crate::repository::{CaptureRepository, DieselError, SubmissionRepository};
use crate::services::{ObjectStore, ScreenshotService};

/// Payload of `capture_submission` and `monitor_submission` jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturePayload {
    pub submission_id: String,
    /// Falls back to the submission's `content_url` when absent.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub capture_type: CaptureType,
}

impl CapturePayload {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, TaskError> {
        Ok(serde_json::from_value(value.clone())?)
    }
}

#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(SubmissionCapture),
    /// Scheduled capture of a submission that already reached a final status.
    Skipped(SubmissionStatus),
}

#[derive(Clone)]
pub struct CaptureTask {
    submissions: SubmissionRepository,
    captures: CaptureRepository,
    screenshots: Arc<dyn ScreenshotService>,
    store: Arc<dyn ObjectStore>,
}

impl CaptureTask {
    pub fn new(
        submissions: SubmissionRepository,
        captures: CaptureRepository,
        screenshots: Arc<dyn ScreenshotService>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            submissions,
            captures,
            screenshots,
            store,
        }
    }

    pub async fn run(&self, payload: &CapturePayload) -> Result<CaptureOutcome, TaskError> {
        let submission = self
            .submissions
            .get(&payload.submission_id)
            .await?
            .ok_or_else(|| TaskError::SubmissionNotFound(payload.submission_id.clone()))?;

        if payload.capture_type == CaptureType::Scheduled && submission.status.is_terminal() {
            info!(
                "Submission {} is {}, skipping scheduled capture",
                submission.id, submission.status
            );
            return Ok(CaptureOutcome::Skipped(submission.status));
        }

        let url = payload
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| submission.content_url.clone());
        let platform = payload.platform.clone().or(submission.platform.clone());

        self.submissions
            .update_status(&submission.id, &SubmissionStatus::Capturing, Utc::now())
            .await?;

        match self
            .capture_and_record(&submission.id, &url, platform.as_deref(), payload.capture_type)
            .await
        {
            Ok(capture) => {
                self.settle_status(&submission.id, &SubmissionStatus::Monitoring)
                    .await?;
                info!(
                    "Captured {} ({}) for submission {}",
                    url,
                    payload.capture_type.as_str(),
                    submission.id
                );
                Ok(CaptureOutcome::Captured(capture))
            }
            Err(err) => {
                let failure = SubmissionCapture::failure(
                    &submission.id,
                    payload.capture_type,
                    err.to_string(),
                    serde_json::json!({ "platform": platform, "url": url }),
                );
                if let Err(e) = self.captures.insert(&failure).await {
                    warn!("Failed to record failed capture for {}: {}", submission.id, e);
                }

                // An initial capture still hands the submission to monitoring;
                // a scheduled one leaves it where it was.
                let restore = match payload.capture_type {
                    CaptureType::Initial => SubmissionStatus::Monitoring,
                    CaptureType::Scheduled => submission.status.clone(),
                };
                if let Err(e) = self.settle_status(&submission.id, &restore).await {
                    warn!("Failed to restore status of {}: {}", submission.id, e);
                }

                Err(err)
            }
        }
    }

    /// Move the submission out of `capturing`, with one retry. If both
    /// writes fail the job errors and its retry repeats the capture.
    async fn settle_status(
        &self,
        submission_id: &str,
        status: &SubmissionStatus,
    ) -> Result<(), DieselError> {
        if let Err(e) = self
            .submissions
            .update_status(submission_id, status, Utc::now())
            .await
        {
            warn!(
                "Failed to set {} on submission {}, retrying: {}",
                status, submission_id, e
            );
            self.submissions
                .update_status(submission_id, status, Utc::now())
                .await?;
        }
        Ok(())
    }

    async fn capture_and_record(
        &self,
        submission_id: &str,
        url: &str,
        platform: Option<&str>,
        capture_type: CaptureType,
    ) -> Result<SubmissionCapture, TaskError> {
        let png = self.screenshots.capture(url).await?;

        let path = format!(
            "captures/{}/{}.png",
            submission_id,
            Utc::now().timestamp_millis()
        );
        self.store.upload(&path, &png, "image/png").await?;
        let public_url = self.store.public_url(&path)?;

        let capture = SubmissionCapture::success(
            submission_id,
            capture_type,
            public_url,
            serde_json::json!({
                "platform": platform,
                "url": url,
                "size_bytes": png.len(),
                "storage_path": path,
            }),
        );
        self.captures.insert(&capture).await?;
        Ok(capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_defaults_to_initial_capture() {
        let payload = CapturePayload::from_value(&serde_json::json!({
            "submission_id": "sub-1",
            "url": "https://tiktok.com/@creator/video/1",
            "platform": null
        }))
        .unwrap();
        assert_eq!(payload.capture_type, CaptureType::Initial);
        assert_eq!(payload.platform, None);
    }

    #[test]
    fn test_payload_without_submission_is_invalid() {
        let err = CapturePayload::from_value(&serde_json::json!({"url": "https://x.com"}))
            .unwrap_err();
        assert!(matches!(err, TaskError::InvalidPayload(_)));
    }

    #[test]
    fn test_screenshot_errors_map_to_task_errors() {
        let err: TaskError = crate::services::ScreenshotError::NotConfigured("key").into();
        assert!(matches!(err, TaskError::Configuration(_)));

        let err: TaskError = crate::services::ScreenshotError::Status {
            status: 502,
            body: "bad gateway".into(),
        }
        .into();
        assert!(matches!(err, TaskError::RemoteService(_)));
    }
}
