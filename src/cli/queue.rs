//! One-shot queue commands: each runs a single invocation and prints its report.

use anyhow::{bail, Context};
use chrono::{Duration, Utc};
use console::style;

use crate::config::Settings;
use crate::models::{EnqueueOptions, JobKind};
use crate::work_queue::JobQueue;
use crate::worker::Worker;

pub async fn cmd_drain(settings: &Settings) -> anyhow::Result<()> {
    let worker = Worker::from_settings(settings)?;
    let report = worker.executor().drain().await?;

    println!(
        "{} Processed {} job(s)",
        style("✓").green(),
        report.processed()
    );
    println!(
        "  {} completed, {} retrying, {} failed, {} skipped",
        report.completed,
        report.retried,
        style(report.failed).red(),
        report.skipped
    );
    Ok(())
}

pub async fn cmd_monitor(settings: &Settings) -> anyhow::Result<()> {
    let worker = Worker::from_settings(settings)?;
    let report = worker.monitor().scan().await?;

    println!(
        "{} {} schedule(s) due, {} capture(s) enqueued, {} deactivated",
        style("✓").green(),
        report.scanned,
        report.enqueued,
        report.deactivated
    );
    Ok(())
}

pub async fn cmd_sweep(settings: &Settings) -> anyhow::Result<()> {
    let worker = Worker::from_settings(settings)?;
    let deleted = worker.retention().run().await?;

    println!(
        "{} Deleted {} job(s) older than {} day(s)",
        style("✓").green(),
        deleted,
        settings.queue.retention_days.max(1)
    );
    Ok(())
}

pub async fn cmd_enqueue(
    settings: &Settings,
    job_type: &str,
    payload: &str,
    priority: i32,
    delay: Option<i64>,
    max_attempts: Option<i32>,
) -> anyhow::Result<()> {
    let Some(kind) = JobKind::from_str(job_type) else {
        let known: Vec<_> = JobKind::ALL.iter().map(|k| k.as_str()).collect();
        bail!("Unknown job type '{}' (expected one of: {})", job_type, known.join(", "));
    };
    let payload: serde_json::Value =
        serde_json::from_str(payload).context("Payload must be valid JSON")?;
    if !payload.is_object() {
        bail!("Payload must be a JSON object");
    }

    let mut options = EnqueueOptions::default()
        .with_priority(priority)
        .with_max_attempts(max_attempts.unwrap_or(settings.queue.max_attempts));
    if let Some(secs) = delay.filter(|s| *s > 0) {
        options = options.scheduled_for(Utc::now() + Duration::seconds(secs));
    }

    let worker = Worker::from_settings(settings)?;
    let id = worker.queue().enqueue(kind, payload, options).await?;

    println!("{} Enqueued {} job {}", style("✓").green(), kind, style(id).cyan());
    Ok(())
}

pub async fn cmd_schedule(
    settings: &Settings,
    submission_id: &str,
    interval_hours: Option<i32>,
    checks: Option<i32>,
) -> anyhow::Result<()> {
    let ctx = settings.create_db_context()?;
    if ctx.submissions().get(submission_id).await?.is_none() {
        bail!("Submission '{}' not found", submission_id);
    }

    let checks = checks.unwrap_or(settings.monitoring.default_checks);
    if checks <= 0 {
        bail!("--checks must be positive");
    }
    let schedule = ctx
        .monitoring()
        .create_for_submission(
            submission_id,
            interval_hours.or(settings.monitoring.default_interval_hours),
            checks,
            Utc::now(),
        )
        .await?;

    println!(
        "{} Monitoring {} every {}h for {} check(s), first at {}",
        style("✓").green(),
        submission_id,
        schedule.interval().num_hours(),
        schedule.checks_remaining,
        schedule.next_check_at.format("%Y-%m-%d %H:%M UTC")
    );
    Ok(())
}
