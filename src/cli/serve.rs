//! Long-running commands: the HTTP server and the in-process trigger runner.

use std::sync::Arc;

use console::style;
use tokio::sync::watch;

use crate::config::Settings;
use crate::scheduler::TriggerRunner;
use crate::server::{self, AppState};
use crate::worker::Worker;

/// Apply migrations and build the worker, printing progress.
async fn prepare(settings: &Settings) -> anyhow::Result<Arc<Worker>> {
    println!("{} Running database migrations...", style("→").cyan());
    let worker = Worker::from_settings(settings)?;
    match worker.db().migrate().await {
        Ok(_) => println!("  {} Database ready", style("✓").green()),
        Err(e) => {
            eprintln!("  {} Migration failed: {}", style("✗").red(), e);
            return Err(anyhow::anyhow!("Database migration failed: {}", e));
        }
    }
    println!("  Worker id: {}", style(worker.worker_id()).dim());
    Ok(Arc::new(worker))
}

/// Flip `tx` to true on Ctrl-C.
fn shutdown_on_ctrl_c(tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutting down");
        }
        let _ = tx.send(true);
    });
}

pub async fn cmd_serve(settings: &Settings, bind: Option<&str>) -> anyhow::Result<()> {
    let worker = prepare(settings).await?;
    let bind = bind.unwrap_or(&settings.bind);

    let (tx, rx) = watch::channel(false);
    shutdown_on_ctrl_c(tx);

    println!("{} Serving on http://{}", style("→").cyan(), bind);
    println!("  Press Ctrl+C to stop");
    server::serve(AppState::new(worker, settings), bind, rx).await
}

pub async fn cmd_run(settings: &Settings, bind: Option<&str>, no_server: bool) -> anyhow::Result<()> {
    let worker = prepare(settings).await?;
    let bind = bind.unwrap_or(&settings.bind);

    let (tx, rx) = watch::channel(false);
    shutdown_on_ctrl_c(tx);

    let triggers = TriggerRunner::new(worker.clone(), settings.triggers.clone()).spawn(rx.clone());
    println!(
        "{} Triggers: drain every {}s, monitor every {}s, sweep every {}s",
        style("→").cyan(),
        settings.triggers.drain_interval_secs,
        settings.triggers.monitor_interval_secs,
        settings.triggers.sweep_interval_secs
    );

    if no_server {
        let mut rx = rx;
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    } else {
        println!("{} Serving on http://{}", style("→").cyan(), bind);
        println!("  Press Ctrl+C to stop");
        server::serve(AppState::new(worker, settings), bind, rx).await?;
    }

    for handle in triggers {
        let _ = handle.await;
    }
    Ok(())
}
