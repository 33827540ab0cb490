//! Schema Tests
//!
//! Verifies that the cetane migrations produce the tables and indexes the
//! Diesel schema and the queue queries rely on.

mod common;

use std::collections::{BTreeMap, BTreeSet};

use rusqlite::{Connection, Result as SqliteResult};

use common::TestDb;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ColumnInfo {
    col_type: String,
    not_null: bool,
    default_value: Option<String>,
    primary_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct IndexInfo {
    table: String,
    columns: Vec<String>,
    partial: Option<String>,
}

/// Columns per table from a SQLite connection.
fn extract_tables(conn: &Connection) -> SqliteResult<BTreeMap<String, BTreeMap<String, ColumnInfo>>> {
    let mut tables = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )?;
    let table_names: Vec<String> = stmt
        .query_map([], |row| row.get(0))?
        .collect::<SqliteResult<Vec<_>>>()?;

    for table_name in table_names {
        let mut columns = BTreeMap::new();
        let mut pragma = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table_name))?;
        let rows = pragma.query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                ColumnInfo {
                    col_type: row.get::<_, String>(2)?.to_uppercase(),
                    not_null: row.get(3)?,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i32>(5)? > 0,
                },
            ))
        })?;
        for row in rows {
            let (name, info) = row?;
            columns.insert(name, info);
        }
        tables.insert(table_name, columns);
    }

    Ok(tables)
}

/// Explicitly created indexes from a SQLite connection.
fn extract_indexes(conn: &Connection) -> SqliteResult<BTreeMap<String, IndexInfo>> {
    let mut indexes = BTreeMap::new();

    let mut stmt = conn.prepare(
        "SELECT name, tbl_name, sql FROM sqlite_master WHERE type='index' AND sql IS NOT NULL ORDER BY name",
    )?;
    let rows: Vec<(String, String, String)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<SqliteResult<Vec<_>>>()?;

    for (name, table, sql) in rows {
        let partial = sql
            .to_uppercase()
            .find(" WHERE ")
            .map(|idx| sql[idx + 7..].trim().to_string());

        let mut pragma = conn.prepare(&format!("PRAGMA index_info(\"{}\")", name))?;
        let columns: Vec<String> = pragma
            .query_map([], |row| {
                row.get::<_, Option<String>>(2)
                    .map(|opt| opt.unwrap_or_else(|| "<expr>".to_string()))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        indexes.insert(
            name,
            IndexInfo {
                table,
                columns,
                partial,
            },
        );
    }

    Ok(indexes)
}

fn column_names(tables: &BTreeMap<String, BTreeMap<String, ColumnInfo>>, table: &str) -> BTreeSet<String> {
    tables
        .get(table)
        .unwrap_or_else(|| panic!("missing table {}", table))
        .keys()
        .cloned()
        .collect()
}

fn set(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_tables_match_diesel_schema() {
    let db = TestDb::new().await;
    let conn = Connection::open(db.db_path()).unwrap();
    let tables = extract_tables(&conn).unwrap();

    assert_eq!(
        column_names(&tables, "job_queue"),
        set(&[
            "id", "job_type", "payload", "status", "priority", "scheduled_for", "attempts",
            "max_attempts", "locked_by", "locked_at", "error_message", "created_at",
            "completed_at",
        ])
    );
    assert_eq!(
        column_names(&tables, "submissions"),
        set(&["id", "content_url", "platform", "status", "updated_at"])
    );
    assert_eq!(
        column_names(&tables, "submission_captures"),
        set(&[
            "id", "submission_id", "capture_type", "screenshot_url", "raw_metadata", "is_live",
            "error_message", "captured_at",
        ])
    );
    assert_eq!(
        column_names(&tables, "monitoring_schedule"),
        set(&[
            "id", "submission_id", "is_active", "next_check_at", "check_interval_hours",
            "checks_remaining", "total_checks", "last_checked_at", "created_at",
        ])
    );

    let jobs = &tables["job_queue"];
    assert!(jobs["id"].primary_key);
    assert!(jobs["job_type"].not_null);
    assert!(!jobs["locked_by"].not_null);
    assert_eq!(jobs["max_attempts"].col_type, "INTEGER");
    assert_eq!(jobs["max_attempts"].default_value.as_deref(), Some("3"));
    assert_eq!(jobs["status"].default_value.as_deref(), Some("'pending'"));
}

#[tokio::test]
async fn test_queue_indexes_exist() {
    let db = TestDb::new().await;
    let conn = Connection::open(db.db_path()).unwrap();
    let indexes = extract_indexes(&conn).unwrap();

    let eligible = &indexes["idx_job_queue_eligible"];
    assert_eq!(eligible.table, "job_queue");
    assert_eq!(eligible.columns, vec!["status", "scheduled_for", "priority"]);
    assert_eq!(eligible.partial.as_deref(), Some("locked_by IS NULL"));

    let due = &indexes["idx_monitoring_schedule_due"];
    assert_eq!(due.table, "monitoring_schedule");
    assert!(due.partial.is_some());

    for name in [
        "idx_job_queue_status_created",
        "idx_submission_captures_submission",
        "idx_monitoring_schedule_submission",
    ] {
        assert!(indexes.contains_key(name), "missing index {}", name);
    }
}

#[tokio::test]
async fn test_migrating_twice_applies_nothing() {
    let db = TestDb::new().await;
    let applied = db.ctx.migrate().await.unwrap();
    assert!(applied.is_empty(), "re-applied: {:?}", applied);
}

#[test]
fn test_each_migration_applies_on_top_of_its_predecessors() {
    use cetane::backend::Sqlite;

    let registry = postwatch::migrations::registry();
    let ordered_names = registry
        .resolve_order()
        .expect("Failed to resolve migration order");

    for (i, _) in ordered_names.iter().enumerate() {
        let conn = Connection::open_in_memory().expect("Failed to open DB");

        for prior_name in &ordered_names[..=i] {
            let migration = registry.get(prior_name).expect("Migration not found");
            for stmt in &migration.forward_sql(&Sqlite) {
                if stmt.trim().is_empty() {
                    continue;
                }
                conn.execute_batch(stmt).unwrap_or_else(|e| {
                    panic!("Migration {} failed: {}\nSQL: {}", migration.name, e, stmt)
                });
            }
        }
    }
}
