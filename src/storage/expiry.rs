//! Background Expiry Sweeper
//!
//! Expired keys are dropped lazily when touched. Keys that are never touched
//! again are reclaimed by this task, which periodically sweeps every
//! database of the engine.
//!
//! The interval adapts: it halves while many keys are expiring and doubles
//! (up to a ceiling) while nothing is.

use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Interval the sweeper starts with
    pub base_interval: Duration,
    /// Lower bound for the interval
    pub min_interval: Duration,
    /// Upper bound for the interval
    pub max_interval: Duration,
    /// Expired fraction above which sweeping speeds up
    pub speedup_threshold: f64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
        }
    }
}

/// Handle to the running sweeper; dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    /// Spawns the sweeper on the current tokio runtime.
    pub fn start(engine: Arc<StorageEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));
        info!("Background expiry sweeper started");
        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
        debug!("Background expiry sweeper stopped");
    }
}

/// Next interval given how many of the swept keys had expired.
fn next_interval(config: &ExpiryConfig, current: Duration, keys: u64, expired: u64) -> Duration {
    if keys > 0 && expired as f64 / keys as f64 > config.speedup_threshold {
        (current / 2).max(config.min_interval)
    } else if expired == 0 {
        (current * 2).min(config.max_interval)
    } else {
        current
    }
}

async fn sweeper_loop(
    engine: Arc<StorageEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    return;
                }
            }
        }

        let mut keys = 0u64;
        let mut expired = 0u64;
        for db in engine.databases() {
            let before = db.len();
            let removed = db.cleanup_expired();
            keys += before + removed;
            expired += removed;
            if removed > 0 {
                debug!(database = db.name(), expired = removed, "Expired keys cleaned up");
            }
        }

        interval = next_interval(&config, interval, keys, expired);
        trace!(interval_ms = interval.as_millis() as u64, "Sweeper interval adjusted");
    }
}

/// Starts the sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<StorageEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}
