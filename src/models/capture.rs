//! Capture records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a capture was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureType {
    /// First capture right after the submission was created.
    #[default]
    Initial,
    /// Follow-up capture produced by the monitoring scheduler.
    Scheduled,
}

impl CaptureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Scheduled => "scheduled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(Self::Initial),
            "scheduled" => Some(Self::Scheduled),
            _ => None,
        }
    }
}

/// Immutable record of one capture attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionCapture {
    pub id: String,
    pub submission_id: String,
    pub capture_type: CaptureType,
    /// Absent when the attempt failed.
    pub screenshot_url: Option<String>,
    pub raw_metadata: serde_json::Value,
    /// Success flag: the post was reachable and rendered.
    pub is_live: bool,
    pub error_message: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl SubmissionCapture {
    pub fn success(
        submission_id: &str,
        capture_type: CaptureType,
        screenshot_url: String,
        raw_metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            capture_type,
            screenshot_url: Some(screenshot_url),
            raw_metadata,
            is_live: true,
            error_message: None,
            captured_at: Utc::now(),
        }
    }

    pub fn failure(
        submission_id: &str,
        capture_type: CaptureType,
        error_message: String,
        raw_metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submission_id: submission_id.to_string(),
            capture_type,
            screenshot_url: None,
            raw_metadata,
            is_live: false,
            error_message: Some(error_message),
            captured_at: Utc::now(),
        }
    }
}
