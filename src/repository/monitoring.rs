//! Monitoring schedule access.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::pool::{DbPool, DieselError};
use super::records::{NewSchedule, ScheduleRecord};
use super::{format_datetime, parse_datetime, parse_datetime_opt};
use crate::models::MonitoringSchedule;
use crate::schema::monitoring_schedule;
use crate::with_conn;

impl From<ScheduleRecord> for MonitoringSchedule {
    fn from(record: ScheduleRecord) -> Self {
        MonitoringSchedule {
            id: record.id,
            submission_id: record.submission_id,
            is_active: record.is_active != 0,
            next_check_at: parse_datetime(&record.next_check_at),
            check_interval_hours: record.check_interval_hours,
            checks_remaining: record.checks_remaining,
            total_checks: record.total_checks,
            last_checked_at: parse_datetime_opt(record.last_checked_at),
            created_at: parse_datetime(&record.created_at),
        }
    }
}

#[derive(Clone)]
pub struct MonitoringRepository {
    pool: DbPool,
}

impl MonitoringRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, schedule: &MonitoringSchedule) -> Result<(), DieselError> {
        let next_check_at = format_datetime(schedule.next_check_at);
        let last_checked_at = schedule.last_checked_at.map(format_datetime);
        let created_at = format_datetime(schedule.created_at);
        let new_schedule = NewSchedule {
            id: &schedule.id,
            submission_id: &schedule.submission_id,
            is_active: i32::from(schedule.is_active),
            next_check_at: &next_check_at,
            check_interval_hours: schedule.check_interval_hours,
            checks_remaining: schedule.checks_remaining,
            total_checks: schedule.total_checks,
            last_checked_at: last_checked_at.as_deref(),
            created_at: &created_at,
        };

        with_conn!(self.pool, conn, {
            diesel::insert_into(monitoring_schedule::table)
                .values(&new_schedule)
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Register a schedule whose first check is one interval after `now`.
    pub async fn create_for_submission(
        &self,
        submission_id: &str,
        check_interval_hours: Option<i32>,
        checks: i32,
        now: DateTime<Utc>,
    ) -> Result<MonitoringSchedule, DieselError> {
        let schedule = MonitoringSchedule::new(submission_id, check_interval_hours, checks, now);
        self.insert(&schedule).await?;
        Ok(schedule)
    }

    pub async fn get(&self, id: &str) -> Result<Option<MonitoringSchedule>, DieselError> {
        with_conn!(self.pool, conn, {
            monitoring_schedule::table
                .find(id)
                .select(ScheduleRecord::as_select())
                .first::<ScheduleRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(MonitoringSchedule::from))
        })
    }

    /// Active schedules with checks left whose next check is due, soonest first.
    pub async fn due(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MonitoringSchedule>, DieselError> {
        let now = format_datetime(now);

        with_conn!(self.pool, conn, {
            monitoring_schedule::table
                .filter(monitoring_schedule::is_active.eq(1))
                .filter(monitoring_schedule::checks_remaining.gt(0))
                .filter(monitoring_schedule::next_check_at.le(&now))
                .order(monitoring_schedule::next_check_at.asc())
                .limit(limit as i64)
                .select(ScheduleRecord::as_select())
                .load::<ScheduleRecord>(&mut conn)
                .await
                .map(|records| records.into_iter().map(MonitoringSchedule::from).collect())
        })
    }

    pub async fn deactivate(&self, id: &str) -> Result<(), DieselError> {
        with_conn!(self.pool, conn, {
            diesel::update(monitoring_schedule::table.find(id))
                .set(monitoring_schedule::is_active.eq(0))
                .execute(&mut conn)
                .await?;
            Ok(())
        })
    }

    /// Spend one check on a due schedule with a single conditional update.
    ///
    /// The update matches only while the row is active, still holds
    /// `seen_next_check_at`, and has checks left. Concurrent scanners that
    /// read the same row therefore see at most one success; the rest get
    /// `None`. On success `next_check_at` moves to `next_check_at`, the
    /// counters are adjusted, and a schedule with no checks left is
    /// deactivated. Returns the schedule as stored afterwards.
    pub async fn claim_check(
        &self,
        id: &str,
        seen_next_check_at: DateTime<Utc>,
        next_check_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<MonitoringSchedule>, DieselError> {
        let seen = format_datetime(seen_next_check_at);
        let next_check_at = format_datetime(next_check_at);
        let now = format_datetime(now);

        with_conn!(self.pool, conn, {
            let updated = diesel::update(
                monitoring_schedule::table
                    .filter(monitoring_schedule::id.eq(id))
                    .filter(monitoring_schedule::is_active.eq(1))
                    .filter(monitoring_schedule::next_check_at.eq(&seen))
                    .filter(monitoring_schedule::checks_remaining.gt(0)),
            )
            .set((
                monitoring_schedule::next_check_at.eq(&next_check_at),
                monitoring_schedule::checks_remaining
                    .eq(monitoring_schedule::checks_remaining - 1),
                monitoring_schedule::total_checks.eq(monitoring_schedule::total_checks + 1),
                monitoring_schedule::last_checked_at.eq(Some(now.as_str())),
            ))
            .execute(&mut conn)
            .await?;

            if updated == 0 {
                return Ok(None);
            }

            diesel::update(
                monitoring_schedule::table
                    .filter(monitoring_schedule::id.eq(id))
                    .filter(monitoring_schedule::checks_remaining.le(0)),
            )
            .set(monitoring_schedule::is_active.eq(0))
            .execute(&mut conn)
            .await?;

            monitoring_schedule::table
                .find(id)
                .select(ScheduleRecord::as_select())
                .first::<ScheduleRecord>(&mut conn)
                .await
                .optional()
                .map(|opt| opt.map(MonitoringSchedule::from))
        })
    }
}
