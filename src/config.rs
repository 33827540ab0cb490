//! Configuration management for postwatch using the prefer crate.
//!
//! A config file (discovered by prefer, or given with `--config`) is read
//! into [`Config`], applied onto default [`Settings`], and environment
//! variables are applied last.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::DEFAULT_MAX_ATTEMPTS;
use crate::repository::util::is_postgres_url;
use crate::repository::{DbContext, DieselError};
use crate::scheduler::monitoring::DEFAULT_MONITOR_BATCH_SIZE;
use crate::scheduler::retention::DEFAULT_RETENTION_DAYS;
use crate::scheduler::TriggerConfig;
use crate::services::{ScreenshotConfig, StorageConfig};
use crate::work_queue::executor::DEFAULT_BATCH_SIZE;
use crate::work_queue::DEFAULT_BACKOFF_BASE_SECS;

/// Default database filename inside the data directory.
const DEFAULT_DATABASE_FILENAME: &str = "postwatch.db";

pub const DEFAULT_BIND: &str = "127.0.0.1:3040";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },
}

/// Job queue tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Attempts given to jobs enqueued by this process.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: i64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Leases older than this are returned to pending. Unset disables the reaper.
    #[serde(default)]
    pub lease_timeout_secs: Option<u64>,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_backoff_base_secs() -> i64 {
    DEFAULT_BACKOFF_BASE_SECS
}
fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            backoff_base_secs: default_backoff_base_secs(),
            retention_days: default_retention_days(),
            lease_timeout_secs: None,
        }
    }
}

impl QueueConfig {
    pub fn lease_timeout(&self) -> Option<chrono::Duration> {
        self.lease_timeout_secs
            .filter(|secs| *secs > 0)
            .map(|secs| chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default = "default_monitor_batch_size")]
    pub batch_size: usize,
    /// Checks given to schedules created from the CLI.
    #[serde(default = "default_checks")]
    pub default_checks: i32,
    #[serde(default)]
    pub default_interval_hours: Option<i32>,
}

fn default_monitor_batch_size() -> usize {
    DEFAULT_MONITOR_BATCH_SIZE
}
fn default_checks() -> i32 {
    7
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            batch_size: default_monitor_batch_size(),
            default_checks: default_checks(),
            default_interval_hours: None,
        }
    }
}

/// Resolved application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    /// Explicit database URL. Unset means SQLite at `data_dir/postwatch.db`.
    pub database_url: Option<String>,
    /// Disable TLS for PostgreSQL connections.
    pub no_tls: bool,
    /// Identity written to `locked_by` by this process.
    pub worker_id: String,
    /// Bearer token accepted by `POST /trigger`. Unset rejects every call.
    pub service_key: Option<String>,
    pub bind: String,
    pub queue: QueueConfig,
    pub monitoring: MonitoringConfig,
    pub screenshot: ScreenshotConfig,
    pub storage: StorageConfig,
    pub triggers: TriggerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("postwatch");

        Self {
            data_dir,
            database_url: None,
            no_tls: false,
            worker_id: default_worker_id(),
            service_key: None,
            bind: DEFAULT_BIND.to_string(),
            queue: QueueConfig::default(),
            monitoring: MonitoringConfig::default(),
            screenshot: ScreenshotConfig::default(),
            storage: StorageConfig::default(),
            triggers: TriggerConfig::default(),
        }
    }
}

/// `<hostname>-<uuid>`, unique per process.
pub fn default_worker_id() -> String {
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "worker".to_string());
    format!("{}-{}", host, uuid::Uuid::new_v4())
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    /// Database URL, falling back to the SQLite file in the data directory.
    pub fn database_url(&self) -> String {
        match self.database_url {
            Some(ref url) => url.clone(),
            None => format!(
                "sqlite:{}",
                self.data_dir.join(DEFAULT_DATABASE_FILENAME).display()
            ),
        }
    }

    pub fn is_postgres(&self) -> bool {
        self.database_url
            .as_ref()
            .is_some_and(|url| is_postgres_url(url))
    }

    /// Create the data directory if the database lives in it.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        if self.database_url.is_none() {
            std::fs::create_dir_all(&self.data_dir)?;
        }
        Ok(())
    }

    pub fn create_db_context(&self) -> Result<DbContext, DieselError> {
        DbContext::from_url(&self.database_url(), self.no_tls)
    }

    /// Apply environment overrides, reading variables through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = var("DATABASE_URL") {
            tracing::debug!("Using DATABASE_URL from environment");
            self.database_url = Some(url);
        }
        if let Some(key) = var("POSTWATCH_SERVICE_KEY") {
            self.service_key = Some(key);
        }
        if let Some(url) = var("SCREENSHOT_API_URL") {
            self.screenshot.api_url = Some(url);
        }
        if let Some(key) = var("SCREENSHOT_API_KEY") {
            self.screenshot.api_key = Some(key);
        }
        if let Some(id) = var("POSTWATCH_WORKER_ID") {
            self.worker_id = id;
        }
        if let Some(dir) = var("POSTWATCH_STORAGE_DIR") {
            self.storage.dir = Some(dir);
        }
        if let Some(url) = var("POSTWATCH_PUBLIC_URL") {
            self.storage.public_url = url;
        }
        if let Some(no_tls) = var("POSTWATCH_NO_TLS") {
            self.no_tls = no_tls == "1" || no_tls.eq_ignore_ascii_case("true");
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_tls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    #[serde(default)]
    pub screenshot: ScreenshotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub triggers: TriggerConfig,
    /// File this was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `postwatch` config file in the standard locations.
    ///
    /// A discovered file that fails to parse is logged and defaults are used.
    pub async fn load() -> Self {
        let path = match prefer::load("postwatch").await {
            Ok(found) => found.source_path().cloned(),
            Err(_) => None,
        };

        let Some(path) = path else {
            return Self::default();
        };
        match Self::load_from_path(&path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file: {}", e);
                Self::default()
            }
        }
    }

    /// Load a config file, parsed by extension (TOML, YAML, else JSON).
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    /// Directory relative paths resolve against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~`, and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref url) = self.database_url {
            settings.database_url = Some(url.clone());
        }
        if let Some(no_tls) = self.no_tls {
            settings.no_tls = no_tls;
        }
        if let Some(ref worker_id) = self.worker_id {
            settings.worker_id = worker_id.clone();
        }
        if let Some(ref key) = self.service_key {
            settings.service_key = Some(key.clone());
        }
        if let Some(ref bind) = self.bind {
            settings.bind = bind.clone();
        }
        settings.queue = self.queue.clone();
        settings.monitoring = self.monitoring.clone();
        settings.screenshot = self.screenshot.clone();
        settings.storage = self.storage.clone();
        if let Some(ref dir) = self.storage.dir {
            settings.storage.dir = Some(self.resolve_path(dir, base_dir).display().to_string());
        }
        settings.triggers = self.triggers.clone();
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file; skips discovery.
    pub config_path: Option<PathBuf>,
}

/// Load settings: config file, then environment.
pub async fn load_settings_with_options(
    options: LoadOptions,
) -> Result<(Settings, Config), ConfigError> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env(|key| std::env::var(key).ok());

    Ok((settings, config))
}
