//! Submission model.
//!
//! Submissions are owned by the marketplace application; the worker only
//! reads them and moves `status` through the capture lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Submission status as seen by the capture worker.
///
/// Statuses the worker does not act on are carried through verbatim in
/// [`SubmissionStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionStatus {
    Pending,
    Capturing,
    Monitoring,
    Approved,
    Rejected,
    Completed,
    Other(String),
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Capturing => "capturing",
            Self::Monitoring => "monitoring",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Other(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "capturing" => Self::Capturing,
            "monitoring" => Self::Monitoring,
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            "completed" => Self::Completed,
            other => Self::Other(other.to_string()),
        }
    }

    /// No automatic transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected | Self::Completed)
    }
}

impl Serialize for SubmissionStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SubmissionStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_str(&s))
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    /// Link to the social post being captured.
    pub content_url: String,
    pub platform: Option<String>,
    pub status: SubmissionStatus,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(id: impl Into<String>, content_url: impl Into<String>, platform: Option<&str>) -> Self {
        Self {
            id: id.into(),
            content_url: content_url.into(),
            platform: platform.map(str::to_string),
            status: SubmissionStatus::Pending,
            updated_at: Utc::now(),
        }
    }
}
