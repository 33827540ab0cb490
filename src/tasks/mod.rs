//! Task handlers run by the job executor.

pub mod capture;

pub use capture::{CaptureOutcome, CapturePayload, CaptureTask};

use thiserror::Error;

use crate::repository::DieselError;
use crate::services::{ScreenshotError, StorageError};

/// Why a task run failed. Every variant sends the job through the retry policy.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Remote service error: {0}")]
    RemoteService(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("Submission not found: {0}")]
    SubmissionNotFound(String),
    #[error("Database error: {0}")]
    Database(#[from] DieselError),
}

impl From<ScreenshotError> for TaskError {
    fn from(err: ScreenshotError) -> Self {
        match err {
            ScreenshotError::NotConfigured(what) => {
                TaskError::Configuration(format!("{} is missing", what))
            }
            other => TaskError::RemoteService(other.to_string()),
        }
    }
}
