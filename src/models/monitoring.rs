//! Recurring-check state for a submission.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Interval used when a schedule has no `check_interval_hours`.
pub const DEFAULT_CHECK_INTERVAL_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSchedule {
    pub id: String,
    pub submission_id: String,
    pub is_active: bool,
    pub next_check_at: DateTime<Utc>,
    pub check_interval_hours: Option<i32>,
    /// Only ever decreases.
    pub checks_remaining: i32,
    pub total_checks: i32,
    pub last_checked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl MonitoringSchedule {
    /// New active schedule whose first check is one interval after `now`.
    pub fn new(
        submission_id: impl Into<String>,
        check_interval_hours: Option<i32>,
        checks: i32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut schedule = Self {
            id: uuid::Uuid::new_v4().to_string(),
            submission_id: submission_id.into(),
            is_active: checks > 0,
            next_check_at: now,
            check_interval_hours,
            checks_remaining: checks.max(0),
            total_checks: 0,
            last_checked_at: None,
            created_at: now,
        };
        schedule.next_check_at = now + schedule.interval();
        schedule
    }

    pub fn interval(&self) -> Duration {
        let hours = self
            .check_interval_hours
            .filter(|h| *h > 0)
            .map(i64::from)
            .unwrap_or(DEFAULT_CHECK_INTERVAL_HOURS);
        Duration::hours(hours)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.checks_remaining > 0 && self.next_check_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_defaults_to_24_hours() {
        let schedule = MonitoringSchedule::new("sub-1", None, 3, Utc::now());
        assert_eq!(schedule.interval(), Duration::hours(24));

        let zero = MonitoringSchedule::new("sub-1", Some(0), 3, Utc::now());
        assert_eq!(zero.interval(), Duration::hours(24));

        let custom = MonitoringSchedule::new("sub-1", Some(6), 3, Utc::now());
        assert_eq!(custom.interval(), Duration::hours(6));
    }

    #[test]
    fn test_first_check_is_one_interval_out() {
        let now = Utc::now();
        let schedule = MonitoringSchedule::new("sub-1", Some(12), 2, now);
        assert_eq!(schedule.next_check_at, now + Duration::hours(12));
        assert!(!schedule.is_due(now));
        assert!(schedule.is_due(now + Duration::hours(12)));
    }

    #[test]
    fn test_schedule_without_checks_is_inactive() {
        let schedule = MonitoringSchedule::new("sub-1", None, 0, Utc::now());
        assert!(!schedule.is_active);
    }
}
