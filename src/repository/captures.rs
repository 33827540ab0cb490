//! Capture records. Rows are only ever inserted.

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{DbPool, DieselError};
use super::records::{CaptureRecord, NewCapture};
use super::{format_datetime, json_error, parse_datetime};
use crate::models::{CaptureType, SubmissionCapture};
use crate::schema::submission_captures;
use crate::with_conn;

impl TryFrom<CaptureRecord> for SubmissionCapture {
    type Error = DieselError;

    fn try_from(record: CaptureRecord) -> Result<Self, Self::Error> {
        let capture_type = CaptureType::from_str(&record.capture_type).ok_or_else(|| {
            DieselError::DeserializationError(
                format!(
                    "Invalid capture type '{}' for capture '{}'",
                    record.capture_type, record.id
                )
                .into(),
            )
        })?;
        let raw_metadata = serde_json::from_str(&record.raw_metadata)
            .map_err(|e| json_error("raw_metadata", &record.id, e))?;

        Ok(SubmissionCapture {
            id: record.id,
            submission_id: record.submission_id,
            capture_type,
            screenshot_url: record.screenshot_url,
            raw_metadata,
            is_live: record.is_live != 0,
            error_message: record.error_message,
            captured_at: parse_datetime(&record.captured_at),
        })
    }
}

#[derive(Clone)]
pub struct CaptureRepository {
    pool: DbPool,
}

impl CaptureRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, capture: &SubmissionCapture) -> Result<(), DieselError> {
        let raw_metadata = serde_json::to_string(&capture.raw_metadata)
            .map_err(|e| json_error("raw_metadata", &capture.id, e))?;
        let captured_at = format_datetime(capture.captured_at);
        let new_capture = NewCapture {
            id: &capture.id,
            submission_id: &capture.submission_id,
            capture_type: capture.capture_type.as_str(),
            screenshot_url: capture.screenshot_url.as_deref(),
            raw_metadata: &raw_metadata,
            is_live: i32::from(capture.is_live),
            error_message: capture.error_message.as_deref(),
            captured_at: &captured_at,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(submission_captures::table)
                .values(&new_capture)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// All captures of a submission, oldest first.
    pub async fn list_for_submission(
        &self,
        submission_id: &str,
    ) -> Result<Vec<SubmissionCapture>, DieselError> {
        with_conn!(self.pool, conn, {
            submission_captures::table
                .filter(submission_captures::submission_id.eq(submission_id))
                .order(submission_captures::captured_at.asc())
                .select(CaptureRecord::as_select())
                .load::<CaptureRecord>(&mut conn)
                .await
                .and_then(|records| {
                    records
                        .into_iter()
                        .map(SubmissionCapture::try_from)
                        .collect()
                })
        })
    }
}
