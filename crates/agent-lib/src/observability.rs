//! Observability infrastructure for runclens
//!
//! Provides:
//! - Prometheus metrics (discovery latency, cache size, cache hit/miss, refresh errors)
//! - Structured event logging with tracing

use prometheus::{
    register_histogram, register_int_counter, register_int_gauge, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for discovery latency (in seconds). Population shells
/// out once per container, so the upper buckets are wide.
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<LensMetricsInner> = OnceLock::new();

struct LensMetricsInner {
    discovery_latency_seconds: Histogram,
    containers_cached: IntGauge,
    refresh_errors: IntCounter,
    cache_hits: IntCounter,
    cache_misses: IntCounter,
}

impl LensMetricsInner {
    fn new() -> Self {
        Self {
            discovery_latency_seconds: register_histogram!(
                "runclens_discovery_latency_seconds",
                "Time spent listing and populating containers",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register discovery_latency_seconds"),

            containers_cached: register_int_gauge!(
                "runclens_containers_cached",
                "Number of containers currently held in the cache"
            )
            .expect("Failed to register containers_cached"),

            refresh_errors: register_int_counter!(
                "runclens_refresh_errors_total",
                "Total number of failed periodic refreshes"
            )
            .expect("Failed to register refresh_errors"),

            cache_hits: register_int_counter!(
                "runclens_cache_hits_total",
                "Reads served from the cache without discovery"
            )
            .expect("Failed to register cache_hits"),

            cache_misses: register_int_counter!(
                "runclens_cache_misses_total",
                "Reads that fell through to discovery"
            )
            .expect("Failed to register cache_misses"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct LensMetrics {
    _private: (),
}

impl Default for LensMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LensMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(LensMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &LensMetricsInner {
        GLOBAL_METRICS.get_or_init(LensMetricsInner::new)
    }

    pub fn observe_discovery_latency(&self, duration_secs: f64) {
        self.inner().discovery_latency_seconds.observe(duration_secs);
    }

    pub fn set_containers_cached(&self, count: usize) {
        self.inner().containers_cached.set(count as i64);
    }

    pub fn inc_refresh_errors(&self) {
        self.inner().refresh_errors.inc();
    }

    pub fn inc_cache_hits(&self) {
        self.inner().cache_hits.inc();
    }

    pub fn inc_cache_misses(&self) {
        self.inner().cache_misses.inc();
    }
}

/// Structured logger for lifecycle events of the binaries
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn log_startup(&self, version: &str, runc_root: &str) {
        info!(
            event = "started",
            component = %self.component,
            version = %version,
            runc_root = %runc_root,
            "runclens started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "shutdown",
            component = %self.component,
            reason = %reason,
            "runclens shutting down"
        );
    }

    /// Log an on-demand read that failed and was answered with no data
    pub fn log_fetch_failure(&self, operation: &str, key: Option<&str>, error: &dyn std::error::Error) {
        warn!(
            event = "fetch_failed",
            component = %self.component,
            operation = %operation,
            key = ?key,
            error = %error,
            "On-demand container fetch failed"
        );
    }
}
