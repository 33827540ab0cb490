//! Schema migrations using cetane.
//!
//! Migrations run over plain rusqlite / tokio-postgres connections, inside a
//! blocking task for SQLite.

use cetane::migrator::{MigrationStateStore, Migrator};
use tracing::info;

use super::pool::DieselError;

/// Apply every pending migration for a database URL. Returns the names applied.
pub async fn run_migrations(database_url: &str, no_tls: bool) -> Result<Vec<String>, DieselError> {
    if super::util::is_postgres_url(database_url) {
        #[cfg(feature = "postgres")]
        {
            run_postgres_migrations(database_url, no_tls).await
        }
        #[cfg(not(feature = "postgres"))]
        {
            let _ = no_tls;
            Err(DieselError::QueryBuilderError(
                "PostgreSQL support not compiled. Use --features postgres".into(),
            ))
        }
    } else {
        let _ = no_tls;
        run_sqlite_migrations(database_url).await
    }
}

fn migration_error(msg: impl std::fmt::Display) -> DieselError {
    DieselError::QueryBuilderError(msg.to_string().into())
}

fn log_applied(applied: &[String]) {
    for name in applied {
        info!("Applied migration: {}", name);
    }
    if applied.is_empty() {
        info!("No pending migrations");
    }
}

async fn run_sqlite_migrations(database_url: &str) -> Result<Vec<String>, DieselError> {
    use cetane::backend::Sqlite;

    let url = database_url
        .strip_prefix("sqlite:")
        .unwrap_or(database_url)
        .to_string();

    tokio::task::spawn_blocking(move || {
        let conn = rusqlite::Connection::open(&url).map_err(migration_error)?;
        let registry = crate::migrations::registry();
        let state = SqliteState::new(&conn)?;

        let mut migrator = Migrator::new(&registry, &Sqlite, state);
        let applied = migrator
            .migrate_forward(|sql| conn.execute_batch(sql).map_err(|e| e.to_string()))
            .map_err(migration_error)?;

        let applied: Vec<String> = applied.iter().map(|name| name.to_string()).collect();
        log_applied(&applied);
        Ok(applied)
    })
    .await
    .map_err(|e| DieselError::QueryBuilderError(Box::new(e)))?
}

#[cfg(feature = "postgres")]
async fn run_postgres_migrations(
    database_url: &str,
    no_tls: bool,
) -> Result<Vec<String>, DieselError> {
    use cetane::backend::Postgres;

    let client = super::pg_tls::connect_raw(database_url, no_tls)
        .await
        .map_err(migration_error)?;
    let registry = crate::migrations::registry();
    let state = PostgresState::new(&client).await?;

    let mut migrator = Migrator::new(&registry, &Postgres, state);
    let applied = migrator
        .migrate_forward(|sql| block_on_pg(client.batch_execute(sql)))
        .map_err(migration_error)?;

    let applied: Vec<String> = applied.iter().map(|name| name.to_string()).collect();
    log_applied(&applied);
    Ok(applied)
}

/// Drive a tokio-postgres future from the synchronous migrator callbacks.
#[cfg(feature = "postgres")]
fn block_on_pg<F, T>(fut: F) -> Result<(), String>
where
    F: std::future::Future<Output = Result<T, tokio_postgres::Error>> + Send,
{
    let rt = tokio::runtime::Handle::current();
    std::thread::scope(|s| {
        s.spawn(|| rt.block_on(fut).map(|_| ()).map_err(|e| e.to_string()))
            .join()
            .map_err(|_| "thread panicked".to_string())?
    })
}

struct SqliteState<'a> {
    conn: &'a rusqlite::Connection,
}

impl<'a> SqliteState<'a> {
    fn new(conn: &'a rusqlite::Connection) -> Result<Self, DieselError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS __cetane_migrations (
                name TEXT PRIMARY KEY NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            )",
        )
        .map_err(migration_error)?;

        Ok(Self { conn })
    }
}

impl MigrationStateStore for SqliteState<'_> {
    fn applied_migrations(&mut self) -> Result<Vec<String>, String> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM __cetane_migrations ORDER BY name")
            .map_err(|e| e.to_string())?;

        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e| e.to_string())?
            .collect::<Result<Vec<String>, _>>()
            .map_err(|e| e.to_string())?;

        Ok(names)
    }

    fn mark_applied(&mut self, name: &str) -> Result<(), String> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO __cetane_migrations (name) VALUES (?1)",
                [name],
            )
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn mark_unapplied(&mut self, name: &str) -> Result<(), String> {
        self.conn
            .execute("DELETE FROM __cetane_migrations WHERE name = ?1", [name])
            .map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(feature = "postgres")]
struct PostgresState<'a> {
    client: &'a tokio_postgres::Client,
    applied: Vec<String>,
}

#[cfg(feature = "postgres")]
impl<'a> PostgresState<'a> {
    async fn new(client: &'a tokio_postgres::Client) -> Result<Self, DieselError> {
        client
            .execute(
                "CREATE TABLE IF NOT EXISTS __cetane_migrations (
                    name TEXT PRIMARY KEY NOT NULL,
                    applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                )",
                &[],
            )
            .await
            .map_err(migration_error)?;

        let rows = client
            .query("SELECT name FROM __cetane_migrations ORDER BY name", &[])
            .await
            .map_err(migration_error)?;

        let applied = rows.iter().map(|r| r.get::<_, String>(0)).collect();
        Ok(Self { client, applied })
    }
}

#[cfg(feature = "postgres")]
impl MigrationStateStore for PostgresState<'_> {
    fn applied_migrations(&mut self) -> Result<Vec<String>, String> {
        Ok(self.applied.clone())
    }

    fn mark_applied(&mut self, name: &str) -> Result<(), String> {
        let client = self.client;
        block_on_pg(client.execute(
            "INSERT INTO __cetane_migrations (name) VALUES ($1) ON CONFLICT DO NOTHING",
            &[&name],
        ))?;
        if !self.applied.iter().any(|n| n == name) {
            self.applied.push(name.to_string());
        }
        Ok(())
    }

    fn mark_unapplied(&mut self, name: &str) -> Result<(), String> {
        let client = self.client;
        block_on_pg(client.execute("DELETE FROM __cetane_migrations WHERE name = $1", &[&name]))?;
        self.applied.retain(|n| n != name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("postwatch.db");
        let url = db.display().to_string();

        let first = run_migrations(&url, false).await.unwrap();
        assert_eq!(
            first,
            vec![
                "0001_job_queue".to_string(),
                "0002_submissions".to_string(),
                "0003_monitoring_schedule".to_string(),
            ]
        );

        let second = run_migrations(&url, false).await.unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn test_registry_resolves_in_dependency_order() {
        let registry = crate::migrations::registry();
        let order = registry.resolve_order().unwrap();
        let names: Vec<String> = order.iter().map(|n| n.to_string()).collect();
        assert_eq!(
            names,
            vec!["0001_job_queue", "0002_submissions", "0003_monitoring_schedule"]
        );
    }

    #[test]
    fn test_every_migration_renders_for_both_backends() {
        let registry = crate::migrations::registry();
        for name in registry.resolve_order().unwrap() {
            let migration = registry.get(name).unwrap();
            let sqlite = migration.forward_sql(&cetane::backend::Sqlite);
            let postgres = migration.forward_sql(&cetane::backend::Postgres);
            assert!(!sqlite.is_empty(), "{name} renders no SQLite statements");
            assert!(!postgres.is_empty(), "{name} renders no PostgreSQL statements");
        }
    }
}
