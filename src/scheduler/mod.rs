//! In-process triggers: periodic drain, monitoring scan, and retention sweep.
//!
//! Each cadence runs in its own task on a `tokio::time::interval`, so a slow
//! drain never holds back the other two. Missed ticks are skipped rather
//! than bunched up.

pub mod monitoring;
pub mod retention;

pub use monitoring::{MonitorReport, MonitoringScheduler};
pub use retention::RetentionSweep;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::worker::Worker;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_drain_interval_secs")]
    pub drain_interval_secs: u64,
    #[serde(default = "default_monitor_interval_secs")]
    pub monitor_interval_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_drain_interval_secs() -> u64 {
    60
}
fn default_monitor_interval_secs() -> u64 {
    5 * 60
}
fn default_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            drain_interval_secs: default_drain_interval_secs(),
            monitor_interval_secs: default_monitor_interval_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

pub struct TriggerRunner {
    worker: Arc<Worker>,
    config: TriggerConfig,
}

impl TriggerRunner {
    pub fn new(worker: Arc<Worker>, config: TriggerConfig) -> Self {
        Self { worker, config }
    }

    /// Spawn the three cadences. They stop once `shutdown` turns true.
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let drain_worker = self.worker.clone();
        let monitor_worker = self.worker.clone();
        let sweep_worker = self.worker;

        vec![
            spawn_cadence(
                "drain",
                Duration::from_secs(self.config.drain_interval_secs),
                shutdown.clone(),
                move || {
                    let worker = drain_worker.clone();
                    async move {
                        if let Err(e) = worker.executor().drain().await {
                            error!("Drain cycle failed: {}", e);
                        }
                    }
                },
            ),
            spawn_cadence(
                "monitor",
                Duration::from_secs(self.config.monitor_interval_secs),
                shutdown.clone(),
                move || {
                    let worker = monitor_worker.clone();
                    async move {
                        if let Err(e) = worker.monitor().scan().await {
                            error!("Monitoring scan failed: {}", e);
                        }
                    }
                },
            ),
            spawn_cadence(
                "sweep",
                Duration::from_secs(self.config.sweep_interval_secs),
                shutdown,
                move || {
                    let worker = sweep_worker.clone();
                    async move {
                        if let Err(e) = worker.retention().run().await {
                            error!("Retention sweep failed: {}", e);
                        }
                    }
                },
            ),
        ]
    }
}

fn spawn_cadence<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period.max(Duration::from_secs(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("Trigger '{}' every {:?}", name, period);

        loop {
            tokio::select! {
                _ = interval.tick() => tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Trigger '{}' stopped", name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_cadence_ticks_until_shutdown() {
        let (tx, rx) = watch::channel(false);
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        let handle = spawn_cadence("test", Duration::from_secs(60), rx, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        // First tick fires immediately, then one per period.
        tokio::time::sleep(Duration::from_secs(150)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
    }
}
