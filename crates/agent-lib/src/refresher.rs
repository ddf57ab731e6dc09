//! Periodic background refresh
//!
//! Each tick runs a full populated discovery pass and merges the result
//! into the cache. Merging only upserts, so containers missing from a pass
//! stay cached until the next bulk refresh replaces the map. A failed tick
//! is skipped and the next one tries again.

use crate::cache::ContainerCache;
use crate::error::DiscoveryError;
use crate::observability::LensMetrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest interval the refresher will tick at
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the periodic refresher
#[derive(Debug, Clone)]
pub struct RefresherConfig {
    /// Time between refreshes (default: 5 seconds)
    pub interval: Duration,
}

impl Default for RefresherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

/// Background task keeping the cache warm
pub struct Refresher {
    cache: Arc<ContainerCache>,
    config: RefresherConfig,
    metrics: LensMetrics,
}

impl Refresher {
    /// Intervals below [`MIN_REFRESH_INTERVAL`] are raised to it
    pub fn new(cache: Arc<ContainerCache>, mut config: RefresherConfig) -> Self {
        if config.interval < MIN_REFRESH_INTERVAL {
            warn!(
                requested_ms = config.interval.as_millis(),
                min_ms = MIN_REFRESH_INTERVAL.as_millis(),
                "Refresh interval too short, clamping"
            );
            config.interval = MIN_REFRESH_INTERVAL;
        }

        Self {
            cache,
            config,
            metrics: LensMetrics::new(),
        }
    }

    /// Run until `shutdown` fires
    ///
    /// A tick in progress always completes before shutdown is observed.
    /// Ticks that fall behind are delayed rather than bunched, so at most
    /// one refresh is outstanding.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_ms = self.config.interval.as_millis(),
            "Starting periodic container refresh"
        );

        let mut ticker = interval_at(Instant::now() + self.config.interval, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(count) => debug!(containers = count, "Periodic refresh merged"),
                        Err(e) => {
                            self.metrics.inc_refresh_errors();
                            debug!(error = %e, "Periodic refresh skipped");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down periodic container refresh");
                    break;
                }
            }
        }
    }

    /// One refresh pass, returning the number of containers merged
    pub async fn tick(&self) -> Result<usize, DiscoveryError> {
        let containers = self.cache.discovery().discover(true).await?;
        let count = containers.len();
        self.cache.merge(containers).await;
        Ok(count)
    }

    /// Start the refresher on the current runtime
    pub fn spawn(self) -> RefresherHandle {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(self.run(shutdown_rx));

        RefresherHandle { shutdown_tx, task }
    }
}

/// Stops a spawned [`Refresher`]
pub struct RefresherHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signal shutdown and wait for the task to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            warn!(error = %e, "Refresher task ended abnormally");
        }
    }
}
