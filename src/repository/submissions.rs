//! Submission access: the worker reads submissions and moves their status.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{DbPool, DieselError};
use super::records::{NewSubmission, SubmissionRecord};
use super::{format_datetime, parse_datetime};
use crate::models::{Submission, SubmissionStatus};
use crate::schema::submissions;
use crate::with_conn;

impl From<SubmissionRecord> for Submission {
    fn from(record: SubmissionRecord) -> Self {
        Submission {
            id: record.id,
            content_url: record.content_url,
            platform: record.platform,
            status: SubmissionStatus::from_str(&record.status),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

#[derive(Clone)]
pub struct SubmissionRepository {
    pool: DbPool,
}

impl SubmissionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Submission>, DieselError> {
        with_conn!(self.pool, conn, {
            submissions::table
                .find(id)
                .select(SubmissionRecord::as_select())
                .first::<SubmissionRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(Submission::from))
        })
    }

    /// Insert a submission. The marketplace owns this table; the worker
    /// only writes rows here from the CLI and from tests.
    pub async fn insert(&self, submission: &Submission) -> Result<(), DieselError> {
        let updated_at = format_datetime(submission.updated_at);
        let new_submission = NewSubmission {
            id: &submission.id,
            content_url: &submission.content_url,
            platform: submission.platform.as_deref(),
            status: submission.status.as_str(),
            updated_at: &updated_at,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(submissions::table)
                .values(&new_submission)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Set the status and touch `updated_at`. Returns false if no such submission.
    pub async fn update_status(
        &self,
        id: &str,
        status: &SubmissionStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        let now = format_datetime(now);

        with_conn!(self.pool, conn, {
            let updated = diesel::update(submissions::table.find(id))
                .set((
                    submissions::status.eq(status.as_str()),
                    submissions::updated_at.eq(&now),
                ))
                .execute(&mut conn)
                .await?;
            Ok(updated == 1)
        })
    }
}
