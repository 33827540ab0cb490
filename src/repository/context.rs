//! Database context: one pool, handing out repositories.

use super::captures::CaptureRepository;
use super::jobs::JobRepository;
use super::monitoring::MonitoringRepository;
use super::pool::{DbPool, DieselError};
use super::submissions::SubmissionRepository;
use super::util::redact_url_password;

/// Owns the connection pool. Create one per process and clone it freely.
///
/// ```ignore
/// let ctx = DbContext::from_url("postwatch.db", false)?;
/// ctx.migrate().await?;
/// let due = ctx.jobs().fetch_eligible(Utc::now(), 10).await?;
/// ```
#[derive(Clone)]
pub struct DbContext {
    pool: DbPool,
    database_url: String,
    no_tls: bool,
}

impl DbContext {
    /// SQLite paths / `sqlite:` URLs, or `postgres://` URLs with the
    /// `postgres` feature.
    pub fn from_url(database_url: &str, no_tls: bool) -> Result<Self, DieselError> {
        Ok(Self {
            pool: DbPool::from_url(database_url, no_tls)?,
            database_url: database_url.to_string(),
            no_tls,
        })
    }

    /// Database URL with any password masked.
    pub fn display_url(&self) -> String {
        redact_url_password(&self.database_url)
    }

    pub fn jobs(&self) -> JobRepository {
        JobRepository::new(self.pool.clone())
    }

    pub fn submissions(&self) -> SubmissionRepository {
        SubmissionRepository::new(self.pool.clone())
    }

    pub fn captures(&self) -> CaptureRepository {
        CaptureRepository::new(self.pool.clone())
    }

    pub fn monitoring(&self) -> MonitoringRepository {
        MonitoringRepository::new(self.pool.clone())
    }

    /// Apply pending migrations.
    pub async fn migrate(&self) -> Result<Vec<String>, DieselError> {
        super::migrations::run_migrations(&self.database_url, self.no_tls).await
    }
}
