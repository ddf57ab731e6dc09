//! TTL-gated container cache
//!
//! Maps pid (as a string) to the last assembled container record. Two
//! freshness windows apply, both measured from the last refresh:
//! - `list_ttl` for bulk listing, after which a full populated discovery
//!   pass replaces the whole map
//! - `get_ttl` for single lookups, after which the one container is
//!   discovered and populated on its own without touching the map
//!
//! The lock is only held to copy out or swap in data. Discovery and
//! population always run before the write lock is taken.

use crate::discovery::Discovery;
use crate::error::CacheError;
use crate::models::Container;
use crate::observability::LensMetrics;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};

/// Freshness windows of the cache
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age served by `list` (default: 10 seconds)
    pub list_ttl: Duration,
    /// Maximum age served by `get` (default: 20 seconds)
    pub get_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            list_ttl: Duration::from_secs(10),
            get_ttl: Duration::from_secs(20),
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Container>,
    last_refreshed: Option<Instant>,
}

impl CacheState {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.last_refreshed
            .map(|at| at.elapsed() < ttl)
            .unwrap_or(false)
    }

    fn snapshot(&self) -> Vec<Container> {
        let mut containers: Vec<Container> = self.entries.values().cloned().collect();
        containers.sort_by_key(|c| c.pid);
        containers
    }
}

/// Concurrency-safe container cache
pub struct ContainerCache {
    discovery: Discovery,
    config: CacheConfig,
    state: RwLock<CacheState>,
    metrics: LensMetrics,
}

impl ContainerCache {
    pub fn new(discovery: Discovery, config: CacheConfig) -> Self {
        Self {
            discovery,
            config,
            state: RwLock::new(CacheState::default()),
            metrics: LensMetrics::new(),
        }
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// All cached containers, refreshing first if older than `list_ttl`
    pub async fn list(&self) -> Result<Vec<Container>, CacheError> {
        {
            let state = self.state.read().await;
            if state.is_fresh(self.config.list_ttl) {
                self.metrics.inc_cache_hits();
                return Ok(state.snapshot());
            }
        }

        self.metrics.inc_cache_misses();
        self.refresh().await
    }

    /// One container by pid key
    ///
    /// Served from the cache while the entry exists and the last refresh is
    /// younger than `get_ttl`. Otherwise the container is discovered and
    /// populated on its own and returned without being written back.
    pub async fn get(&self, key: &str) -> Result<Container, CacheError> {
        {
            let state = self.state.read().await;
            if let Some(container) = state.entries.get(key) {
                if state.is_fresh(self.config.get_ttl) {
                    self.metrics.inc_cache_hits();
                    return Ok(container.clone());
                }
            }
        }

        self.metrics.inc_cache_misses();
        let pid: i32 = key
            .trim()
            .parse()
            .map_err(|_| CacheError::InvalidKey(key.to_string()))?;

        let containers = self.discovery.discover(false).await?;
        let mut container = containers
            .into_iter()
            .find(|c| c.pid == pid)
            .ok_or(CacheError::NotFound(pid))?;

        self.discovery
            .assembler()
            .populate(&mut container)
            .await
            .map_err(CacheError::Populate)?;

        debug!(pid = pid, container_id = %container.id, "Container fetched on demand");
        Ok(container)
    }

    /// Force a full populated discovery pass and replace the whole map
    pub async fn refresh(&self) -> Result<Vec<Container>, CacheError> {
        let containers = self.discovery.discover(true).await?;

        let entries: HashMap<String, Container> = containers
            .iter()
            .map(|c| (c.cache_key(), c.clone()))
            .collect();
        let count = entries.len();

        {
            let mut state = self.state.write().await;
            state.entries = entries;
            state.last_refreshed = Some(Instant::now());
        }

        self.metrics.set_containers_cached(count);
        info!(containers = count, "Container cache refreshed");
        Ok(containers)
    }

    /// Upsert `containers` without removing keys absent from them
    pub async fn merge(&self, containers: Vec<Container>) {
        let count = {
            let mut state = self.state.write().await;
            for container in containers {
                state.entries.insert(container.cache_key(), container);
            }
            state.last_refreshed = Some(Instant::now());
            state.entries.len()
        };

        self.metrics.set_containers_cached(count);
    }

    /// Current contents regardless of freshness
    pub async fn snapshot(&self) -> Vec<Container> {
        self.state.read().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Time since the last refresh or merge, `None` before the first one
    pub async fn last_refresh_age(&self) -> Option<Duration> {
        self.state
            .read()
            .await
            .last_refreshed
            .map(|at| at.elapsed())
    }
}
