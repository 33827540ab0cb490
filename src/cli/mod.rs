//! CLI parser and dispatch.

mod db;
mod queue;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "postwatch")]
#[command(about = "Job queue worker and social post capture for the creator marketplace")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Apply database migrations
    Migrate,

    /// Show job counts by status
    Status,

    /// Run one queue drain cycle
    Drain,

    /// Run one monitoring scan
    Monitor,

    /// Delete completed and failed jobs past the retention window
    Sweep,

    /// Add a job to the queue
    Enqueue {
        /// Job type (capture_submission, monitor_submission, send_email, send_push, process_payment)
        job_type: String,
        /// JSON payload
        #[arg(default_value = "{}")]
        payload: String,
        /// Higher runs first
        #[arg(short, long, default_value = "0")]
        priority: i32,
        /// Delay before the job becomes eligible, in seconds
        #[arg(short, long)]
        delay: Option<i64>,
        /// Attempts before the job is failed (default: queue.max_attempts)
        #[arg(short, long)]
        max_attempts: Option<i32>,
    },

    /// Start recurring monitoring for a submission
    Schedule {
        /// Submission ID
        submission_id: String,
        /// Hours between checks (default 24)
        #[arg(short, long)]
        interval_hours: Option<i32>,
        /// Number of checks (default: monitoring.default_checks)
        #[arg(short, long)]
        checks: Option<i32>,
    },

    /// Start the HTTP server (health and manual trigger)
    Serve {
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run the recurring triggers and the HTTP server until Ctrl-C
    Run {
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
        /// Skip the HTTP server
        #[arg(long)]
        no_server: bool,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (settings, config) = load_settings_with_options(options).await?;
    if let Some(ref path) = config.source_path {
        tracing::debug!("Loaded config from {}", path.display());
    }

    match cli.command {
        Commands::Migrate => db::cmd_migrate(&settings).await,
        Commands::Status => db::cmd_status(&settings).await,
        Commands::Drain => queue::cmd_drain(&settings).await,
        Commands::Monitor => queue::cmd_monitor(&settings).await,
        Commands::Sweep => queue::cmd_sweep(&settings).await,
        Commands::Enqueue {
            job_type,
            payload,
            priority,
            delay,
            max_attempts,
        } => {
            queue::cmd_enqueue(&settings, &job_type, &payload, priority, delay, max_attempts)
                .await
        }
        Commands::Schedule {
            submission_id,
            interval_hours,
            checks,
        } => queue::cmd_schedule(&settings, &submission_id, interval_hours, checks).await,
        Commands::Serve { bind } => serve::cmd_serve(&settings, bind.as_deref()).await,
        Commands::Run { bind, no_server } => {
            serve::cmd_run(&settings, bind.as_deref(), no_server).await
        }
    }
}
