//! Job queue table access, including the conditional-update lease.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{DbPool, DieselError};
use super::records::{JobRecord, NewJob};
use super::{format_datetime, json_error, parse_datetime, parse_datetime_opt};
use crate::models::{Job, JobStatus};
use crate::schema::job_queue;
use crate::with_conn;

impl TryFrom<JobRecord> for Job {
    type Error = DieselError;

    fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
        let status = JobStatus::from_str(&record.status).ok_or_else(|| {
            DieselError::DeserializationError(
                format!("Invalid job status '{}' for job '{}'", record.status, record.id).into(),
            )
        })?;
        let payload = serde_json::from_str(&record.payload)
            .map_err(|e| json_error("payload", &record.id, e))?;

        Ok(Job {
            id: record.id,
            job_type: record.job_type,
            payload,
            status,
            priority: record.priority,
            scheduled_for: parse_datetime(&record.scheduled_for),
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            locked_by: record.locked_by,
            locked_at: parse_datetime_opt(record.locked_at),
            error_message: record.error_message,
            created_at: parse_datetime(&record.created_at),
            completed_at: parse_datetime_opt(record.completed_at),
        })
    }
}

/// Result of trying to lease a job.
#[derive(Debug)]
pub enum ClaimOutcome {
    /// The row is now ours; carries the job as it stands after the claim.
    Claimed(Job),
    /// Another worker got there first, or the job is no longer pending.
    Conflict,
}

#[derive(Clone)]
pub struct JobRepository {
    pool: DbPool,
}

impl JobRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, job: &Job) -> Result<(), DieselError> {
        let payload =
            serde_json::to_string(&job.payload).map_err(|e| json_error("payload", &job.id, e))?;
        let scheduled_for = format_datetime(job.scheduled_for);
        let created_at = format_datetime(job.created_at);
        let new_job = NewJob {
            id: &job.id,
            job_type: &job.job_type,
            payload: &payload,
            status: job.status.as_str(),
            priority: job.priority,
            scheduled_for: &scheduled_for,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            created_at: &created_at,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(job_queue::table)
                .values(&new_job)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    pub async fn get(&self, id: &str) -> Result<Option<Job>, DieselError> {
        with_conn!(self.pool, conn, {
            job_queue::table
                .find(id)
                .select(JobRecord::as_select())
                .first::<JobRecord>(&mut conn)
                .await
                .optional()
                .and_then(|opt| opt.map(Job::try_from).transpose())
        })
    }

    /// Jobs that may be claimed at `now`: pending, due, unlocked.
    ///
    /// Highest priority first, then oldest `scheduled_for`.
    pub async fn fetch_eligible(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Job>, DieselError> {
        let now = format_datetime(now);

        with_conn!(self.pool, conn, {
            job_queue::table
                .filter(job_queue::status.eq(JobStatus::Pending.as_str()))
                .filter(job_queue::scheduled_for.le(&now))
                .filter(job_queue::locked_by.is_null())
                .order((job_queue::priority.desc(), job_queue::scheduled_for.asc()))
                .limit(limit as i64)
                .select(JobRecord::as_select())
                .load::<JobRecord>(&mut conn)
                .await
                .and_then(|records| records.into_iter().map(Job::try_from).collect())
        })
    }

    /// Lease a job with a single conditional update.
    ///
    /// The update only matches while the row is still pending and unlocked,
    /// so of any number of concurrent callers at most one sees a row change.
    pub async fn claim(
        &self,
        id: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, DieselError> {
        let now = format_datetime(now);

        with_conn!(self.pool, conn, {
            let updated = diesel::update(
                job_queue::table
                    .filter(job_queue::id.eq(id))
                    .filter(job_queue::status.eq(JobStatus::Pending.as_str()))
                    .filter(job_queue::locked_by.is_null()),
            )
            .set((
                job_queue::status.eq(JobStatus::Processing.as_str()),
                job_queue::locked_by.eq(worker_id),
                job_queue::locked_at.eq(&now),
                job_queue::attempts.eq(job_queue::attempts + 1),
            ))
            .execute(&mut conn)
            .await?;

            if updated == 0 {
                return Ok(ClaimOutcome::Conflict);
            }

            let record = job_queue::table
                .find(id)
                .select(JobRecord::as_select())
                .first::<JobRecord>(&mut conn)
                .await
                .optional()?;

            match record {
                Some(record) => Ok(ClaimOutcome::Claimed(Job::try_from(record)?)),
                None => Ok(ClaimOutcome::Conflict),
            }
        })
    }

    /// Mark a leased job completed and release the lease.
    ///
    /// Returns false if `worker_id` no longer holds the job.
    pub async fn mark_completed(
        &self,
        id: &str,
        worker_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DieselError> {
        let now = format_datetime(now);

        with_conn!(self.pool, conn, {
            let updated = diesel::update(
                job_queue::table
                    .filter(job_queue::id.eq(id))
                    .filter(job_queue::locked_by.eq(worker_id)),
            )
            .set((
                job_queue::status.eq(JobStatus::Completed.as_str()),
                job_queue::completed_at.eq(Some(now.as_str())),
                job_queue::locked_by.eq(None::<&str>),
                job_queue::locked_at.eq(None::<&str>),
            ))
            .execute(&mut conn)
            .await?;
            Ok(updated == 1)
        })
    }

    /// Put a leased job back to pending, not before `retry_at`.
    pub async fn schedule_retry(
        &self,
        id: &str,
        worker_id: &str,
        retry_at: DateTime<Utc>,
        error: &str,
    ) -> Result<bool, DieselError> {
        let retry_at = format_datetime(retry_at);

        with_conn!(self.pool, conn, {
            let updated = diesel::update(
                job_queue::table
                    .filter(job_queue::id.eq(id))
                    .filter(job_queue::locked_by.eq(worker_id)),
            )
            .set((
                job_queue::status.eq(JobStatus::Pending.as_str()),
                job_queue::scheduled_for.eq(&retry_at),
                job_queue::error_message.eq(Some(error)),
                job_queue::locked_by.eq(None::<&str>),
                job_queue::locked_at.eq(None::<&str>),
            ))
            .execute(&mut conn)
            .await?;
            Ok(updated == 1)
        })
    }

    /// Mark a leased job permanently failed.
    pub async fn mark_failed(
        &self,
        id: &str,
        worker_id: &str,
        error: &str,
    ) -> Result<bool, DieselError> {
        with_conn!(self.pool, conn, {
            let updated = diesel::update(
                job_queue::table
                    .filter(job_queue::id.eq(id))
                    .filter(job_queue::locked_by.eq(worker_id)),
            )
            .set((
                job_queue::status.eq(JobStatus::Failed.as_str()),
                job_queue::error_message.eq(Some(error)),
                job_queue::locked_by.eq(None::<&str>),
                job_queue::locked_at.eq(None::<&str>),
            ))
            .execute(&mut conn)
            .await?;
            Ok(updated == 1)
        })
    }

    /// Return jobs leased before `cutoff` to pending. Returns the number released.
    pub async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, DieselError> {
        let cutoff = format_datetime(cutoff);

        with_conn!(self.pool, conn, {
            diesel::update(
                job_queue::table
                    .filter(job_queue::status.eq(JobStatus::Processing.as_str()))
                    .filter(job_queue::locked_at.lt(&cutoff)),
            )
            .set((
                job_queue::status.eq(JobStatus::Pending.as_str()),
                job_queue::error_message.eq(Some("lease expired")),
                job_queue::locked_by.eq(None::<&str>),
                job_queue::locked_at.eq(None::<&str>),
            ))
            .execute(&mut conn)
            .await
        })
    }

    /// Delete completed and failed jobs created before `cutoff`.
    pub async fn delete_finished_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, DieselError> {
        let cutoff = format_datetime(cutoff);
        let terminal = [JobStatus::Completed.as_str(), JobStatus::Failed.as_str()];

        with_conn!(self.pool, conn, {
            diesel::delete(
                job_queue::table
                    .filter(job_queue::status.eq_any(terminal))
                    .filter(job_queue::created_at.lt(&cutoff)),
            )
            .execute(&mut conn)
            .await
        })
    }

    /// Count jobs per status, for operator output.
    pub async fn count_by_status(&self) -> Result<Vec<(String, i64)>, DieselError> {
        with_conn!(self.pool, conn, {
            job_queue::table
                .group_by(job_queue::status)
                .select((job_queue::status, diesel::dsl::count_star()))
                .order(job_queue::status.asc())
                .load::<(String, i64)>(&mut conn)
                .await
        })
    }
}
