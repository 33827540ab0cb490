//! Persistence for the job queue and the marketplace tables the worker touches.
//!
//! All access goes through Diesel over a [`DbPool`], so the same queries run
//! on SQLite and (with the `postgres` feature) PostgreSQL.

pub mod captures;
pub mod context;
pub mod jobs;
pub mod migrations;
pub mod monitoring;
#[cfg(feature = "postgres")]
pub mod pg_tls;
pub mod pool;
pub mod records;
pub mod submissions;
pub mod util;

pub use captures::CaptureRepository;
pub use context::DbContext;
pub use jobs::{ClaimOutcome, JobRepository};
pub use migrations::run_migrations;
pub use monitoring::MonitoringRepository;
pub use pool::{DbPool, DieselError};
pub use submissions::SubmissionRepository;

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage.
///
/// Fixed-width microsecond RFC 3339 in UTC, so string comparison in SQL
/// orders the same way as the instants do.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp, falling back to the Unix epoch on garbage.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

pub(crate) fn json_error(what: &str, id: &str, e: serde_json::Error) -> DieselError {
    DieselError::DeserializationError(format!("Invalid {} JSON for '{}': {}", what, id, e).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_is_fixed_width_and_sortable() {
        let early = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1);

        let a = format_datetime(early);
        let b = format_datetime(late);
        assert_eq!(a, "2024-03-09T08:05:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(parse_datetime(&b), late);
    }

    #[test]
    fn test_parse_garbage_falls_back() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
        assert_eq!(parse_datetime_opt(Some("nope".into())), None);
        assert_eq!(parse_datetime_opt(None), None);
    }
}
